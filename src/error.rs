//! Error types for xmlpack
//!
//! This module defines all error types used throughout the library.
//! Malformed documents and schemas never surface here: they become
//! diagnostics. These errors cover the caller's own inputs (unreadable
//! files, unsupported locations, limits) and cancelled requests.

use std::fmt;
use thiserror::Error;

/// Result type alias using xmlpack Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xmlpack operations
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// XML or RELAX NG parsing error
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Schema could not be used (wrong kind, failed simplification)
    #[error("schema error: {0}")]
    Schema(String),

    /// Resource loading error
    #[error("resource error: {0}")]
    Resource(String),

    /// Operation not supported for this input
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// The request was cancelled by its caller
    #[error("operation was cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// XML parsing error
    #[error("XML error: {0}")]
    Xml(String),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Check whether this error comes from a cancelled request
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Parsing error with an optional source position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// 1-based (line, column) of the error
    pub location: Option<(u32, u32)>,
    /// Document or schema the error comes from
    pub source: Option<String>,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            source: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, line: u32, col: u32) -> Self {
        self.location = Some((line, col));
        self
    }

    /// Set the source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref src) = self.source {
            write!(f, "{}:", src)?;
            if let Some((line, col)) = self.location {
                write!(f, "{}:{}:", line, col)?;
            }
            write!(f, " ")?;
        } else if let Some((line, col)) = self.location {
            write!(f, "{}:{}: ", line, col)?;
        }

        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("Opening and ending tag mismatch")
            .with_location(3, 7)
            .with_source("window.ui");

        assert_eq!(
            format!("{}", err),
            "window.ui:3:7: Opening and ending tag mismatch"
        );
    }

    #[test]
    fn test_parse_error_without_source() {
        let err = ParseError::new("bad").with_location(1, 2);
        assert_eq!(format!("{}", err), "1:2: bad");
        assert_eq!(format!("{}", ParseError::new("bad")), "bad");
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = ParseError::new("test").into();
        assert!(matches!(err, Error::Parse(_)));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_cancelled());
        assert!(Error::Cancelled.is_cancelled());
    }
}

//! Resource location resolution
//!
//! This module handles resolution of schema references found in documents
//! (`<?xml-model href?>`, `<include href>`, `<externalRef href>`) against the
//! file that contains them.

use crate::error::Result;
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Resource location - can be a URL, file path, or string identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// File system path
    Path(PathBuf),
    /// URL (http, https, resource, ...)
    Url(Url),
    /// String identifier (for in-memory resources)
    String(String),
}

impl Location {
    /// Create a location from a string (auto-detect type)
    pub fn from_str(s: &str) -> Result<Self> {
        if let Some(url) = parse_url(s) {
            if url.scheme() == "file" {
                if let Ok(path) = url.to_file_path() {
                    return Ok(Location::Path(path));
                }
            }
            return Ok(Location::Url(url));
        }

        let path = PathBuf::from(s);
        if path.exists() || s.starts_with('/') || s.starts_with('.') {
            return Ok(Location::Path(path));
        }

        Ok(Location::String(s.to_string()))
    }

    /// Resolve `href` relative to the location of `base`
    ///
    /// Hrefs carrying a scheme are taken as-is. Anything else is joined to
    /// the parent directory of `base`; without a usable parent the href is
    /// used as a plain path.
    pub fn resolve(base: Option<&Location>, href: &str) -> Location {
        if let Some(url) = parse_url(href) {
            if url.scheme() == "file" {
                if let Ok(path) = url.to_file_path() {
                    return Location::Path(path);
                }
            }
            return Location::Url(url);
        }

        match base {
            Some(Location::Path(path)) => match path.parent() {
                Some(parent) => Location::Path(normalize(&parent.join(href))),
                None => Location::Path(PathBuf::from(href)),
            },
            Some(Location::Url(url)) => match url.join(href) {
                Ok(joined) => Location::Url(joined),
                Err(_) => Location::Path(PathBuf::from(href)),
            },
            _ => Location::Path(PathBuf::from(href)),
        }
    }

    /// Get the location as a string
    pub fn as_str(&self) -> String {
        match self {
            Location::Path(p) => p.to_string_lossy().to_string(),
            Location::Url(u) => u.to_string(),
            Location::String(s) => s.clone(),
        }
    }

    /// Get the location as a URI, the form used in diagnostics
    pub fn to_uri(&self) -> String {
        match self {
            Location::Path(p) => Url::from_file_path(p)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| p.to_string_lossy().to_string()),
            Location::Url(u) => u.to_string(),
            Location::String(s) => s.clone(),
        }
    }

    /// Local path of this location, if any
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Location::Path(p) => Some(p),
            _ => None,
        }
    }

    /// File name extension, lowercased
    pub fn extension(&self) -> Option<String> {
        let name = match self {
            Location::Path(p) => p.file_name()?.to_string_lossy().to_string(),
            Location::Url(u) => u.path_segments()?.last()?.to_string(),
            Location::String(_) => return None,
        };
        name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
    }

    /// Check if this is a remote location (URL)
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Url(_))
    }

    /// Check if this is a local file
    pub fn is_file(&self) -> bool {
        matches!(self, Location::Path(_))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Single-letter schemes are Windows drive letters, not URLs.
fn parse_url(s: &str) -> Option<Url> {
    match Url::parse(s) {
        Ok(url) if url.scheme().len() > 1 => Some(url),
        _ => None,
    }
}

fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

//! Resource loading utilities
//!
//! This module handles loading of schemas and their included fragments.
//! Only local files can be loaded; in-memory locations return their text.

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::locations::Location;
use std::fs;
use std::time::SystemTime;

/// Content of a loaded resource
#[derive(Debug, Clone)]
pub struct Resource {
    /// Raw bytes
    pub content: Vec<u8>,
    /// Modification time, when the source has one
    pub mtime: Option<SystemTime>,
}

/// Resource loader for schemas and documents
#[derive(Debug, Clone)]
pub struct Loader {
    /// Resource limits
    limits: Limits,
}

impl Loader {
    /// Create a new loader with default settings
    pub fn new() -> Self {
        Self {
            limits: Limits::default(),
        }
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Limits used by this loader
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Load a resource
    pub fn load(&self, location: &Location) -> Result<Resource> {
        match location {
            Location::Path(path) => {
                let mtime = fs::metadata(path)
                    .map_err(|e| {
                        Error::Resource(format!("Failed to stat '{}': {}", path.display(), e))
                    })?
                    .modified()
                    .ok();
                let content = fs::read(path).map_err(|e| {
                    Error::Resource(format!("Failed to read file '{}': {}", path.display(), e))
                })?;

                self.limits.check_xml_size(content.len())?;

                Ok(Resource { content, mtime })
            }
            Location::Url(url) => Err(Error::Unsupported(format!(
                "File must be saved locally to parse: {}",
                url
            ))),
            Location::String(s) => Ok(Resource {
                content: s.as_bytes().to_vec(),
                mtime: None,
            }),
        }
    }

    /// Load a resource as a string
    pub fn load_string(&self, location: &Location) -> Result<String> {
        let resource = self.load(location)?;
        String::from_utf8(resource.content)
            .map_err(|e| Error::Resource(format!("'{}' is not valid UTF-8: {}", location, e)))
    }

    /// Load a resource without blocking the async runtime
    ///
    /// Stats the file first for its modification time, then reads it.
    pub async fn load_async(&self, location: &Location) -> Result<Resource> {
        match location {
            Location::Path(path) => {
                let metadata = tokio::fs::metadata(path).await.map_err(|e| {
                    Error::Resource(format!("Failed to stat '{}': {}", path.display(), e))
                })?;
                let content = tokio::fs::read(path).await.map_err(|e| {
                    Error::Resource(format!("Failed to read file '{}': {}", path.display(), e))
                })?;

                self.limits.check_xml_size(content.len())?;

                Ok(Resource {
                    content,
                    mtime: metadata.modified().ok(),
                })
            }
            other => self.load(other),
        }
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "<grammar/>").unwrap();

        let location = Location::Path(file.path().to_path_buf());
        let loader = Loader::new();
        let resource = loader.load(&location).unwrap();

        assert!(String::from_utf8_lossy(&resource.content).contains("<grammar/>"));
        assert!(resource.mtime.is_some());
    }

    #[test]
    fn test_load_from_string() {
        let location = Location::String("<element/>".to_string());
        let content = Loader::new().load_string(&location).unwrap();
        assert_eq!(content, "<element/>");
    }

    #[test]
    fn test_remote_is_unsupported() {
        let location = Location::from_str("http://example.com/a.rng").unwrap();
        assert!(matches!(
            Loader::new().load(&location),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let location = Location::Path("/nonexistent/dir/schema.rng".into());
        assert!(matches!(
            Loader::new().load(&location),
            Err(Error::Resource(_))
        ));
    }

    #[test]
    fn test_size_limit() {
        let mut file = NamedTempFile::new().unwrap();
        let large_content = "x".repeat(11 * 1024 * 1024); // 11 MB
        write!(file, "{}", large_content).unwrap();

        let location = Location::Path(file.path().to_path_buf());
        let loader = Loader::new().with_limits(Limits::strict());

        assert!(loader.load(&location).is_err());
    }

    #[tokio::test]
    async fn test_load_async() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "<start/>").unwrap();

        let location = Location::Path(file.path().to_path_buf());
        let resource = Loader::new().load_async(&location).await.unwrap();
        assert_eq!(resource.content, b"<start/>");
        assert!(resource.mtime.is_some());
    }
}

//! Schema references of a document and their fetched state
//!
//! A [`SchemaCacheEntry`] is created for every schema a document points
//! at (`<?xml-model href="…"?>`, a doctype, the bundled GtkBuilder
//! grammar). Entries with a file are filled in by [`fetch`] or
//! [`fetch_blocking`] and shared through the service's schema cache.

use crate::error::Result;
use crate::loaders::{Loader, Resource};
use crate::locations::Location;
use crate::rng::Schema;
use serde::Serialize;
use std::sync::Arc;
use std::time::SystemTime;

/// Kind of schema a document references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaKind {
    /// Document type definition
    Dtd,
    /// RELAX NG, XML syntax
    Rng,
    /// W3C XML Schema
    XmlSchema,
}

impl SchemaKind {
    /// Kind for a schema file extension
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "rng" => Some(SchemaKind::Rng),
            "xsd" => Some(SchemaKind::XmlSchema),
            _ => None,
        }
    }
}

/// How far fetching a schema got
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaState {
    /// Not fetched
    #[default]
    None,
    /// Loaded but not a kind that can be parsed
    WrongFileType,
    /// The file could not be read
    CantLoad,
    /// The schema could not be used for validation
    CantValidate,
    /// The file is not a valid schema
    CantParse,
    /// Parsed and ready
    Parsed,
}

/// A schema referenced by a document
#[derive(Debug, Clone)]
pub struct SchemaCacheEntry {
    /// Schema kind
    pub kind: SchemaKind,
    /// Fetch state
    pub state: SchemaState,
    /// Schema file, `None` for schemas embedded in the document
    pub file: Option<Location>,
    /// Raw schema content
    pub content: Option<Arc<[u8]>>,
    /// Parsed RELAX NG schema
    pub schema: Option<Arc<Schema>>,
    /// Why loading or parsing failed
    pub error_message: Option<String>,
    /// 0-based line of the reference in the document
    pub line: u32,
    /// 0-based column of the reference in the document
    pub col: u32,
    /// Modification time of the file when it was read
    pub mtime: Option<SystemTime>,
}

impl SchemaCacheEntry {
    /// Unfetched entry
    pub fn new(kind: SchemaKind, file: Option<Location>) -> Self {
        Self {
            kind,
            state: SchemaState::None,
            file,
            content: None,
            schema: None,
            error_message: None,
            line: 0,
            col: 0,
            mtime: None,
        }
    }

    /// Set the 0-based position of the reference
    pub fn at(mut self, line: u32, col: u32) -> Self {
        self.line = line;
        self.col = col;
        self
    }

    /// Take over the fetched fields of a cached entry
    ///
    /// Kind, file and reference position stay those of `self`.
    pub fn merge_from(&mut self, cached: &SchemaCacheEntry) {
        if cached.content.is_some() {
            self.content = cached.content.clone();
        }
        if cached.error_message.is_some() {
            self.error_message = cached.error_message.clone();
        }
        if cached.schema.is_some() {
            self.schema = cached.schema.clone();
        }
        self.state = cached.state;
        self.mtime = cached.mtime;
    }

    /// True once a RELAX NG schema is available
    pub fn is_parsed(&self) -> bool {
        self.state == SchemaState::Parsed && self.schema.is_some()
    }

    fn failed(mut self, state: SchemaState, message: String) -> Self {
        self.state = state;
        self.error_message = Some(message);
        self
    }
}

/// Load and parse a schema without blocking the runtime
///
/// Parsing runs on the blocking pool since it may read included files.
pub async fn fetch(loader: &Loader, location: &Location, kind: SchemaKind) -> SchemaCacheEntry {
    tracing::debug!(schema = %location, ?kind, "fetching schema");
    let loaded = loader.load_async(location).await;
    let worker_loader = loader.clone();
    let worker_location = location.clone();

    let entry = tokio::task::spawn_blocking(move || {
        from_resource(&worker_loader, &worker_location, kind, loaded)
    })
    .await;
    match entry {
        Ok(entry) => entry,
        Err(e) => SchemaCacheEntry::new(kind, Some(location.clone()))
            .failed(SchemaState::CantParse, format!("schema parser failed: {}", e)),
    }
}

/// Load and parse a schema on the current thread
pub fn fetch_blocking(loader: &Loader, location: &Location, kind: SchemaKind) -> SchemaCacheEntry {
    tracing::debug!(schema = %location, ?kind, "fetching schema");
    from_resource(loader, location, kind, loader.load(location))
}

fn from_resource(
    loader: &Loader,
    location: &Location,
    kind: SchemaKind,
    loaded: Result<Resource>,
) -> SchemaCacheEntry {
    let mut entry = SchemaCacheEntry::new(kind, Some(location.clone()));

    let resource = match loaded {
        Ok(resource) => resource,
        Err(e) => {
            tracing::warn!(schema = %location, error = %e, "can't load schema");
            return entry.failed(SchemaState::CantLoad, e.to_string());
        }
    };
    entry.mtime = resource.mtime;

    if kind != SchemaKind::Rng {
        entry.content = Some(Arc::from(resource.content));
        return entry.failed(
            SchemaState::WrongFileType,
            format!("{:?} schemas are not supported", kind),
        );
    }

    match Schema::parse(&resource.content, Some(location.clone()), loader) {
        Ok(schema) => {
            entry.content = Some(Arc::from(resource.content));
            entry.schema = Some(Arc::new(schema));
            entry.state = SchemaState::Parsed;
            tracing::debug!(schema = %location, "schema parsed");
            entry
        }
        Err(e) => {
            tracing::warn!(schema = %location, error = %e, "can't parse schema");
            entry.failed(SchemaState::CantParse, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RNG: &str = r#"<element name="doc" xmlns="http://relaxng.org/ns/structure/1.0"><empty/></element>"#;

    #[test]
    fn test_fetch_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.rng");
        std::fs::write(&path, RNG).unwrap();

        let entry = fetch_blocking(&Loader::new(), &Location::Path(path), SchemaKind::Rng);
        assert_eq!(entry.state, SchemaState::Parsed);
        assert!(entry.is_parsed());
        assert!(entry.mtime.is_some());
        assert!(entry.error_message.is_none());
    }

    #[test]
    fn test_fetch_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let location = Location::Path(dir.path().join("missing.rng"));
        let entry = fetch_blocking(&Loader::new(), &location, SchemaKind::Rng);
        assert_eq!(entry.state, SchemaState::CantLoad);
        assert!(entry.content.is_none());
        assert!(entry.error_message.unwrap().contains("missing.rng"));
    }

    #[test]
    fn test_fetch_invalid_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.rng");
        std::fs::write(&path, "<notrng/>").unwrap();
        let entry = fetch_blocking(&Loader::new(), &Location::Path(path), SchemaKind::Rng);
        assert_eq!(entry.state, SchemaState::CantParse);
        assert!(entry.schema.is_none());
    }

    #[test]
    fn test_xml_schema_is_kept_unparsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.xsd");
        std::fs::write(&path, "<xs:schema xmlns:xs=\"http://www.w3.org/2001/XMLSchema\"/>").unwrap();
        let entry = fetch_blocking(&Loader::new(), &Location::Path(path), SchemaKind::XmlSchema);
        assert_eq!(entry.state, SchemaState::WrongFileType);
        assert!(entry.content.is_some());
    }

    #[test]
    fn test_merge_keeps_reference_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.rng");
        std::fs::write(&path, RNG).unwrap();
        let location = Location::Path(path);

        let cached = fetch_blocking(&Loader::new(), &location, SchemaKind::Rng);
        let mut entry = SchemaCacheEntry::new(SchemaKind::Rng, Some(location)).at(3, 4);
        entry.merge_from(&cached);
        assert!(entry.is_parsed());
        assert_eq!((entry.line, entry.col), (3, 4));
    }

    #[tokio::test]
    async fn test_fetch_async() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.rng");
        std::fs::write(&path, RNG).unwrap();
        let entry = fetch(&Loader::new(), &Location::Path(path), SchemaKind::Rng).await;
        assert!(entry.is_parsed());
    }
}

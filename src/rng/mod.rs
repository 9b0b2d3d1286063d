//! RELAX NG schemas (XML syntax)
//!
//! A [`Schema`] is loaded in three passes:
//!
//! 1. [`cleanup`] normalizes the document tree and pulls in `include` and
//!    `externalRef` targets
//! 2. the parser turns the cleaned tree into a graph of [`Define`]s, one
//!    [`Grammar`] per `<grammar>`, merging `combine`d starts and defines and
//!    linking refs to their defines
//! 3. the start patterns are simplified (`notAllowed`/`empty` propagation,
//!    group flattening, attribute hoisting)
//!
//! The graph may be cyclic through refs; everything walking it either stops
//! at refs or bounds its depth.
//!
//! Datatypes are recorded but never checked.

pub mod cleanup;
pub mod define;
pub mod grammar;
mod parser;
mod simplify;

pub use define::{Combine, Define, DefineArena, DefineId, DefineType};
pub use grammar::{Grammar, GrammarId};

use crate::documents::Document;
use crate::error::{Error, ParseError, Result};
use crate::loaders::Loader;
use crate::locations::Location;
use crate::RNG_NAMESPACE;
use cleanup::Cleanup;
use parser::Parser;
use serde::Serialize;
use std::fmt;
use std::path::Path;

const MAX_DUMP_DEPTH: usize = 256;

/// A parsed and simplified RELAX NG schema
#[derive(Debug, Clone)]
pub struct Schema {
    arena: DefineArena,
    grammars: Vec<Grammar>,
    top: GrammarId,
    location: Option<Location>,
    errors: Vec<ParseError>,
}

impl Schema {
    /// Parse a schema from bytes
    ///
    /// References are resolved against `location` and loaded through
    /// `loader`. Recoverable markup errors in the schema document are kept
    /// in [`Schema::errors`]; unloadable references are skipped.
    pub fn parse(content: &[u8], location: Option<Location>, loader: &Loader) -> Result<Self> {
        let document = Document::parse(content, location.clone(), loader.limits())?;
        let errors = document.errors.clone();
        let Some(mut root) = document.into_root() else {
            return Err(Error::Schema("schema has no root element".to_string()));
        };

        if !root.name.is_in(RNG_NAMESPACE) {
            return Err(Error::Schema(format!(
                "root element <{}> is not in the RELAX NG namespace",
                root.local_name()
            )));
        }

        Cleanup::new(loader).run(&mut root, location.as_ref());

        let mut parser = Parser::new();
        let top = parser.parse_document(&root);
        loader.limits().check_defines(parser.arena.len())?;

        tracing::debug!(
            location = location.as_ref().map(Location::to_uri).unwrap_or_default(),
            defines = parser.arena.len(),
            grammars = parser.grammars.len(),
            "parsed RELAX NG schema"
        );

        Ok(Self {
            arena: parser.arena,
            grammars: parser.grammars,
            top,
            location,
            errors,
        })
    }

    /// Load and parse the schema at a location
    pub fn from_location(loader: &Loader, location: &Location) -> Result<Self> {
        let resource = loader.load(location)?;
        Self::parse(&resource.content, Some(location.clone()), loader)
    }

    /// Load and parse a schema file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let location = Location::Path(path.as_ref().to_path_buf());
        Self::from_location(&Loader::new(), &location)
    }

    /// All patterns of the schema
    pub fn defines(&self) -> &DefineArena {
        &self.arena
    }

    /// The top-level grammar
    pub fn grammar(&self) -> &Grammar {
        &self.grammars[self.top.0]
    }

    /// All grammars, nested and external ones included
    pub fn grammars(&self) -> &[Grammar] {
        &self.grammars
    }

    /// First start pattern of the top-level grammar
    pub fn start(&self) -> Option<DefineId> {
        self.grammar().start_defines
    }

    /// Where the schema was loaded from
    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// Recoverable markup errors of the schema document
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Serializable snapshot of the start patterns and named defines
    pub fn to_dump(&self) -> SchemaDump {
        let grammar = self.grammar();
        SchemaDump {
            location: self.location.as_ref().map(Location::to_uri),
            start: self
                .arena
                .siblings(grammar.start_defines)
                .map(|id| self.dump_pattern(id, 0))
                .collect(),
            defines: grammar
                .defines
                .iter()
                .filter_map(|(name, defs)| {
                    let first = *defs.first()?;
                    Some(NamedPattern {
                        name: name.clone(),
                        pattern: self.dump_pattern(first, 0),
                    })
                })
                .collect(),
        }
    }

    /// Indented text rendering of the schema graph
    pub fn dump(&self) -> String {
        self.to_dump().to_string()
    }

    fn dump_pattern(&self, id: DefineId, depth: usize) -> PatternDump {
        let def = &self.arena[id];
        let mut dump = PatternDump {
            kind: def.kind,
            name: def.name.clone(),
            ns: def.ns.clone().filter(|ns| !ns.is_empty()),
            line: def.line,
            attributes: Vec::new(),
            content: Vec::new(),
            name_class: Vec::new(),
        };

        // Refs are printed by name; their targets appear under `defines`.
        if matches!(def.kind, DefineType::Ref | DefineType::ParentRef) || depth >= MAX_DUMP_DEPTH {
            return dump;
        }

        let walk = |first: Option<DefineId>| -> Vec<PatternDump> {
            self.arena
                .siblings(first)
                .map(|child| self.dump_pattern(child, depth + 1))
                .collect()
        };
        dump.attributes = walk(def.attributes);
        dump.content = walk(def.content);
        dump.name_class = walk(def.name_class);
        dump
    }
}

impl std::str::FromStr for Schema {
    type Err = Error;

    fn from_str(xml: &str) -> Result<Self> {
        Self::parse(xml.as_bytes(), None, &Loader::new())
    }
}

/// Snapshot of a schema for dumps
#[derive(Debug, Clone, Serialize)]
pub struct SchemaDump {
    /// Schema location as a URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Start patterns
    pub start: Vec<PatternDump>,
    /// Named defines of the top-level grammar
    pub defines: Vec<NamedPattern>,
}

/// A define and its name
#[derive(Debug, Clone, Serialize)]
pub struct NamedPattern {
    /// Define name
    pub name: String,
    /// Define pattern
    pub pattern: PatternDump,
}

/// One pattern of a dump
#[derive(Debug, Clone, Serialize)]
pub struct PatternDump {
    /// Pattern kind
    pub kind: DefineType,
    /// Name or value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Non-empty namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ns: Option<String>,
    /// Source line
    pub line: u32,
    /// Attribute patterns
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<PatternDump>,
    /// Content patterns
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<PatternDump>,
    /// Name class patterns
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub name_class: Vec<PatternDump>,
}

impl PatternDump {
    fn write(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        write!(f, "{:indent$}{}", "", self.kind, indent = indent)?;
        if let Some(name) = &self.name {
            write!(f, " name=\"{}\"", name)?;
        }
        if let Some(ns) = &self.ns {
            write!(f, " ns=\"{}\"", ns)?;
        }
        writeln!(f)?;

        for (label, list) in [
            ("name class", &self.name_class),
            ("attributes", &self.attributes),
            ("content", &self.content),
        ] {
            if list.is_empty() {
                continue;
            }
            writeln!(f, "{:indent$}{}:", "", label, indent = indent + 2)?;
            for child in list {
                child.write(f, indent + 4)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for SchemaDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "start:")?;
        for pattern in &self.start {
            pattern.write(f, 2)?;
        }
        for define in &self.defines {
            writeln!(f, "define \"{}\":", define.name)?;
            define.pattern.write(f, 2)?;
        }
        Ok(())
    }
}

//! # xmlpack
//!
//! RELAX NG schema engine and positioned XML symbol trees for editor tooling.
//!
//! The crate loads RELAX NG grammars (XML syntax), simplifies them into a
//! define graph, builds an error-tolerant symbol tree of the document being
//! edited and answers "what can be typed here" for a cursor position.
//!
//! ## Features
//!
//! - RELAX NG parsing with `include`, `externalRef`, `combine` and `div`
//! - Pattern simplification (`notAllowed`/`empty` propagation, attribute hoisting)
//! - Recovering XML tokenizer with exact tag ranges
//! - Generic XML and GtkBuilder `.ui` document front ends
//! - Element, attribute and value completion driven by the grammar
//! - Single-flight caches for analyses and schemas
//!
//! ## Example
//!
//! ```rust,ignore
//! use xmlpack::{rng::Schema, tree_builder::TreeBuilder, position::Position};
//!
//! let schema = Schema::from_file("interface.rng")?;
//! let analysis = TreeBuilder::new().build(Some(&location), content, 1)?;
//! let position = Position::resolve(Arc::new(analysis), content, 4, 12);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Utilities
pub mod names;
pub mod namespaces;
pub mod locations;

// Resource loading
pub mod loaders;
pub mod sax;
pub mod documents;

// RELAX NG engine
pub mod rng;

// Document model
pub mod symbol;
pub mod stack;
pub mod analysis;
pub mod schema;
pub mod parser;
pub mod tree_builder;

// Cursor queries
pub mod path;
pub mod position;
pub mod completion;

// Async plumbing
pub mod cache;
pub mod service;

// Re-exports for convenience
pub use analysis::{Analysis, Diagnostic, Severity};
pub use error::{Error, Result};
pub use limits::Limits;
pub use loaders::Loader;
pub use locations::Location;
pub use position::{Position, PositionDetail, PositionKind};
pub use rng::Schema;
pub use service::{ServiceConfig, XmlService};
pub use symbol::{NodeId, SymbolTree};

/// Version of the xmlpack library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// RELAX NG structure namespace
pub const RNG_NAMESPACE: &str = "http://relaxng.org/ns/structure/1.0";

/// XML namespace
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// XMLNS namespace
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

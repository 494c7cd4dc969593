//! # vlx-core
//!
//! Pure-Rust reader and writer for **VLX**, a self-describing object-graph
//! serialization format with a human-readable text encoding and a compact
//! binary encoding.
//!
//! A document is a tree of tagged structures (ordered `key = value` pairs),
//! lists, typed numeric arrays, and rawtext blocks. Structures may declare a
//! unique `ID`; any value may refer to one by writing its `#uid`. After
//! parsing, the linker attaches every such reference to its target, turning
//! the tree into a graph.
//!
//! ## Quick start
//!
//! ```rust
//! use vlx_core::{export_binary, export_text, import_binary, link, parse_text};
//!
//! let text = "VLX version=100 encoding=ascii\n\
//!             <Scene> { ID = #scene name = \"demo\" self = #scene }";
//! let root = parse_text(text).unwrap();
//! link(&root).unwrap();
//!
//! let name = root.borrow().value("name").and_then(|v| v.as_str().map(String::from));
//! assert_eq!(name.as_deref(), Some("demo"));
//!
//! // Text → binary → text keeps the document.
//! let back = import_binary(&export_binary(&root)).unwrap();
//! assert_eq!(export_text(&back), export_text(&root));
//! ```
//!
//! ## Modules
//!
//! - [`value`]: the document tree (`Value`, `Structure`, `List`, arrays, rawtext)
//! - [`tokenizer`] / [`parser`]: VLX text → tree
//! - [`text_export`]: tree → VLX text
//! - [`binary`]: tree ↔ binary chunks ([`varint`] holds the integer coding)
//! - [`visitor`]: the double-dispatch walker every pass is built on
//! - [`collector`]: UID reference counting ahead of export
//! - [`linker`]: two-pass UID resolution
//! - [`serializer`]: load/save orchestration against a domain-object [`Registry`]
//! - [`stats`] / [`json`]: inspection helpers
//! - [`error`]: error types

pub mod binary;
pub mod collector;
pub mod error;
pub mod json;
pub mod linker;
pub mod parser;
pub mod serializer;
pub mod stats;
pub mod text_export;
pub mod tokenizer;
pub mod value;
pub mod varint;
pub mod visitor;

pub use binary::{export_binary, export_binary_with, import_binary, is_binary, ChunkKind, MAGIC};
pub use collector::{collect_uid_usage, UidUsage};
pub use error::{LinkError, Result, VlxError};
pub use json::{structure_to_json, to_json};
pub use linker::{link, Linker};
pub use parser::{parse_text, Parser, VLX_ENCODING, VLX_VERSION};
pub use serializer::{Object, ObjectRef, Registry, Serializer, SerializerStatus};
pub use stats::DocumentStats;
pub use text_export::{export_text, export_text_with, TextExportOptions};
pub use value::{
    ArrayInteger, ArrayReal, ArrayScalar, KeyValue, List, NodeId, Payload, RawtextBlock,
    Structure, StructureRef, TaggedNode, UidRef, Value, ValueType, NULL_UID,
};
pub use visitor::{VisitedSet, Visitor};

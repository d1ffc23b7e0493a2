//! wxml-core: scanning, tree building and component knowledge for WXML.
//!
//! # Public API
//!
//! - [`Scanner`] -- resumable tokenizer; [`ScanState`] fully describes where
//!   it is, so scanning can restart at any token boundary
//! - [`parse()`] -- build a [`Document`] (element tree plus [`ParseError`]s)
//! - [`Document::find_node_at`] / [`Document::find_node_before`] -- position
//!   queries used by completion and hover
//! - [`schema`] -- the [`SchemaProvider`] trait and the bundled component table
//! - [`entities`] -- named character references
//!
//! Offsets everywhere in this crate are byte offsets into the source text.

pub mod entities;
pub mod error;
pub mod node;
pub mod parser;
pub mod scanner;
pub mod schema;
pub mod tags;

// ── Convenience re-exports ───────────────────────────────────────────

pub use error::ParseError;
pub use node::{Attribute, Document, Node, NodeId, NodeRef};
pub use parser::parse;
pub use scanner::{RawText, ScanState, Scanner, TagContext, Token, TokenKind};
pub use schema::{AttributeKind, AttributeSpec, BuiltinSchema, EnumValue, SchemaProvider, TagSpec};

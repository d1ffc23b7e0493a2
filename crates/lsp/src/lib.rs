//! WXML Language Server Protocol implementation.
//!
//! Publishes diagnostics on open and change, answers completion and hover
//! requests, and keeps the latest parse of every open document. Connects
//! to editors via the `wxml lsp` CLI subcommand over stdio.
//!
//! The analysis functions ([`completion::compute_completions`],
//! [`diagnostics::compute_diagnostics`], [`hover::compute_hover`]) are plain
//! functions over a text snapshot and its parse, usable without a server.

pub mod completion;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod hover;
pub mod line_index;
pub mod server;

pub use config::{CompletionConfig, Settings};
pub use error::ServiceError;
pub use line_index::LineIndex;

/// Run the LSP server over stdio. This is the public entry point
/// called by `wxml lsp`.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    server::run()
}

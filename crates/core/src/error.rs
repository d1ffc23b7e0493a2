use std::fmt;

use serde::{Deserialize, Serialize};

/// A problem found while scanning or building the tree.
///
/// Offsets are byte offsets into the source text. Some messages cover the
/// token minus its last byte; that shape is preserved so editors highlight
/// the same span users are used to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub start: usize,
    pub end: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, start: usize, end: usize) -> Self {
        ParseError {
            message: message.into(),
            start,
            end,
        }
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "message": self.message,
            "start":   self.start,
            "end":     self.end,
        })
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}: {}", self.start, self.end, self.message)
    }
}

impl std::error::Error for ParseError {}

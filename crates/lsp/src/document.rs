//! Document state management for open files in the editor.

use std::collections::HashMap;
use std::path::PathBuf;

use wxml_core::{parse, Document};

/// Tracks which documents are currently open in the editor, with the parse
/// of their latest text.
pub struct DocumentState {
    documents: HashMap<String, DocumentInfo>,
}

/// Information about a single open document.
pub struct DocumentInfo {
    /// File system path, for `file://` documents only.
    pub path: Option<PathBuf>,
    /// Editor-reported version number.
    pub version: i32,
    pub content: String,
    /// Parse of `content`. Replaced on every change.
    pub parsed: Document,
}

impl DocumentInfo {
    fn new(uri: &str, version: i32, content: String) -> Self {
        DocumentInfo {
            path: uri_to_path(uri),
            version,
            parsed: parse(&content),
            content,
        }
    }
}

impl Default for DocumentState {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentState {
    pub fn new() -> Self {
        Self {
            documents: HashMap::new(),
        }
    }

    /// Track a newly opened document.
    pub fn open(&mut self, uri: &str, version: i32, content: String) -> &DocumentInfo {
        self.documents
            .insert(uri.to_owned(), DocumentInfo::new(uri, version, content));
        &self.documents[uri]
    }

    /// Replace the content of an already-open document and re-parse it.
    pub fn change(&mut self, uri: &str, version: i32, content: String) -> Option<&DocumentInfo> {
        let doc = self.documents.get_mut(uri)?;
        doc.version = version;
        doc.parsed = parse(&content);
        doc.content = content;
        Some(doc)
    }

    /// Remove a closed document from tracking.
    pub fn close(&mut self, uri: &str) {
        self.documents.remove(uri);
    }

    /// Get information about an open document.
    pub fn get(&self, uri: &str) -> Option<&DocumentInfo> {
        self.documents.get(uri)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Convert a `file://` URI to a file system path. Other schemes have no
/// local path.
pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    let path = uri.strip_prefix("file://")?;
    let decoded = percent_decode(path);
    // On Windows: file:///C:/foo -> C:/foo
    #[cfg(windows)]
    {
        let decoded = decoded.strip_prefix('/').unwrap_or(&decoded);
        Some(PathBuf::from(decoded))
    }
    #[cfg(not(windows))]
    {
        Some(PathBuf::from(decoded))
    }
}

/// Decode percent-encoded bytes in a URI path (e.g. `%3A` -> `:`).
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(h), Some(l)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                out.push(h << 4 | l);
                i += 3;
                continue;
            }
        }
        // Malformed percent encoding passes through.
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_change_close() {
        let mut state = DocumentState::new();
        let uri = "file:///proj/pages/index.wxml";
        let doc = state.open(uri, 1, "<view>".to_owned());
        assert_eq!(doc.parsed.errors().len(), 1);
        assert_eq!(doc.path.as_deref(), Some(std::path::Path::new("/proj/pages/index.wxml")));

        let doc = state.change(uri, 2, "<view></view>".to_owned()).expect("open");
        assert_eq!(doc.version, 2);
        assert!(doc.parsed.errors().is_empty());
        assert!(state.change("file:///other.wxml", 1, String::new()).is_none());

        state.close(uri);
        assert!(state.get(uri).is_none());
        assert!(state.is_empty());
    }

    #[cfg(not(windows))]
    #[test]
    fn file_uris_decode() {
        assert_eq!(
            uri_to_path("file:///home/me/my%20app/%E9%A1%B5.wxml"),
            Some(PathBuf::from("/home/me/my app/页.wxml"))
        );
        assert_eq!(uri_to_path("file:///a%zzb"), Some(PathBuf::from("/a%zzb")));
        assert_eq!(uri_to_path("untitled:Untitled-1"), None);
    }
}

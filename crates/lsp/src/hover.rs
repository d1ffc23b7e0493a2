//! Hover documentation for tags and attributes.
//!
//! Documentation comes from markdown files under the configured docs
//! directory when present (`<tag>.md`, `<tag>/<attribute>.md`), otherwise it
//! is generated from the schema.

use std::fs;
use std::path::Path;

use lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Range};
use wxml_core::schema::{self, AttributeSpec, SchemaProvider, TagSpec};
use wxml_core::{Document, NodeRef, ScanState, Scanner, TokenKind};

use crate::line_index::LineIndex;

pub fn compute_hover(
    content: &str,
    document: &Document,
    offset: usize,
    schema: &dyn SchemaProvider,
    docs_dir: Option<&Path>,
) -> Option<Hover> {
    let node = document.find_node_at(offset)?;
    let tag = node.tag.as_deref()?.to_ascii_lowercase();
    let index = LineIndex::new(content);
    let docs = Docs { schema, docs_dir };

    if let Some(attr) = node.attribute_at_offset(offset) {
        let range = index.range(attr.offset, attr.end());
        let markdown = docs
            .attribute(&node, &tag, &attr.name)
            .or_else(|| docs.tag(&tag))?;
        return Some(make_hover(markdown, range));
    }

    let (kind, from) = match node.end_tag_start {
        Some(end_tag_start) if offset >= end_tag_start => (TokenKind::EndTag, end_tag_start),
        _ => (TokenKind::StartTag, node.start),
    };
    let (start, end) = tag_name_range(content, offset, kind, from)?;
    let markdown = docs.tag(&tag)?;
    Some(make_hover(markdown, index.range(start, end)))
}

pub fn make_hover(markdown: String, range: Range) -> Hover {
    Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: markdown,
        }),
        range: Some(range),
    }
}

struct Docs<'a> {
    schema: &'a dyn SchemaProvider,
    docs_dir: Option<&'a Path>,
}

impl Docs<'_> {
    fn tag(&self, tag: &str) -> Option<String> {
        let spec = self.schema.tag(tag)?;
        self.read(&[tag])
            .or_else(|| Some(tag_markdown(spec)))
    }

    fn attribute(&self, node: &NodeRef<'_>, tag: &str, name: &str) -> Option<String> {
        let mode = self
            .schema
            .tag(tag)
            .and_then(TagSpec::mode_attribute)
            .and_then(|m| node.attribute_value(&m.name));
        let spec = schema::find_attribute(self.schema, tag, name, mode)?;
        self.read(&[tag, name])
            .or_else(|| Some(attribute_markdown(tag, spec)))
    }

    /// `<docs>/a/b.md` for `["a", "b"]`.
    fn read(&self, parts: &[&str]) -> Option<String> {
        let dir = self.docs_dir?;
        if parts.iter().any(|p| p.is_empty() || p.contains(['/', '\\']) || *p == "..") {
            return None;
        }
        let (last, dirs) = parts.split_last()?;
        let mut path = dir.to_path_buf();
        path.extend(dirs);
        path.push(format!("{last}.md"));
        fs::read_to_string(path).ok()
    }
}

/// Start and end of the `kind` token under `offset`, scanning from `from`.
fn tag_name_range(content: &str, offset: usize, kind: TokenKind, from: usize) -> Option<(usize, usize)> {
    let mut scanner = Scanner::with_state(content, from, ScanState::WithinContent);
    let mut token = scanner.next_token();
    while token != TokenKind::Eos
        && (scanner.token_end() < offset || (scanner.token_end() == offset && token != kind))
    {
        token = scanner.next_token();
    }
    (token == kind && offset <= scanner.token_end())
        .then(|| (scanner.token_offset(), scanner.token_end()))
}

pub(crate) fn tag_markdown(spec: &TagSpec) -> String {
    let mut out = format!("**<{}>**", spec.name);
    if let Some(desc) = &spec.desc {
        out.push_str("\n\n");
        out.push_str(desc);
    }
    for tip in &spec.tips {
        out.push_str("\n\n> ");
        out.push_str(tip);
    }
    if let Some(link) = &spec.doc_link {
        out.push_str(&format!("\n\n[Documentation]({link})"));
    }
    out
}

pub(crate) fn attribute_markdown(tag: &str, spec: &AttributeSpec) -> String {
    let mut out = format!("**{}** `{}`\n\nAttribute of `<{tag}>`", spec.name, spec.kind.label());
    if let Some(desc) = &spec.desc {
        out.push_str("\n\n");
        out.push_str(desc);
    }
    if spec.has_default() {
        if let Some(default) = &spec.default_value {
            out.push_str(&format!("\n\nDefault: `{default}`"));
        }
    }
    if let Some(since) = &spec.since {
        out.push_str(&format!("\n\nSince: {since}"));
    }
    let values = spec.kind.values();
    if !values.is_empty() {
        out.push('\n');
        for value in values {
            match &value.desc {
                Some(desc) => out.push_str(&format!("\n- `{}`: {desc}", value.value)),
                None => out.push_str(&format!("\n- `{}`", value.value)),
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use wxml_core::{parse, BuiltinSchema};

    use super::*;

    fn hover_text(text: &str, offset: usize, docs: Option<&Path>) -> Option<String> {
        let doc = parse(text);
        compute_hover(text, &doc, offset, BuiltinSchema::shared(), docs).map(|h| match h.contents {
            HoverContents::Markup(m) => m.value,
            other => panic!("unexpected hover contents {other:?}"),
        })
    }

    #[test]
    fn docs_directory_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("view.md"), "# view from docs").unwrap();
        fs::create_dir(dir.path().join("text")).unwrap();
        fs::write(dir.path().join("text").join("space.md"), "# space from docs").unwrap();

        let text = "<view><text space=\"emsp\"></text></view>";
        assert_eq!(hover_text(text, 2, Some(dir.path())).as_deref(), Some("# view from docs"));
        assert_eq!(hover_text(text, 13, Some(dir.path())).as_deref(), Some("# space from docs"));
        // No file for `<text>`: generated from the schema.
        let generated = hover_text(text, 8, Some(dir.path())).unwrap();
        assert!(generated.starts_with("**<text>**"), "{generated}");
    }

    #[test]
    fn attribute_markdown_lists_values() {
        let schema = BuiltinSchema::shared();
        let space = schema::find_attribute(schema, "text", "space", None).unwrap();
        let md = attribute_markdown("text", space);
        assert!(md.contains("Attribute of `<text>`"));
        assert!(md.contains("- `ensp`"));
        assert!(!md.contains("Default:"));
    }

    #[test]
    fn unknown_tag_has_no_hover() {
        assert_eq!(hover_text("<my-comp></my-comp>", 3, None), None);
    }
}

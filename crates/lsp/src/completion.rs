//! Completion at a cursor offset.
//!
//! The engine re-scans from the start of the element before the cursor. A
//! [`ScanState`] fully describes the scanner, so starting there in
//! `WithinContent` reproduces exactly the tokens a scan from the top of the
//! document would see. The token under (or ending at) the cursor, together
//! with the scanner state after whitespace, decides what to suggest.

use std::collections::HashSet;

use lsp_types::{
    Command, CompletionItem, CompletionItemKind, CompletionList, CompletionTextEdit,
    Documentation, InsertTextFormat, MarkupContent, MarkupKind, Range, TextEdit,
};
use wxml_core::schema::{self, AttributeKind, SchemaProvider};
use wxml_core::{entities, tags, Document, NodeRef, ScanState, Scanner, TagContext, TokenKind};

use crate::config::CompletionConfig;
use crate::hover::{attribute_markdown, tag_markdown};
use crate::line_index::LineIndex;

const TRIGGER_SUGGEST: &str = "editor.action.triggerSuggest";

/// Nothing is suggested outside of any element.
///
/// # Panics
///
/// Panics if `offset` is past the end of `content`.
pub fn compute_completions(
    content: &str,
    document: &Document,
    offset: usize,
    schema: &dyn SchemaProvider,
    config: &CompletionConfig,
) -> CompletionList {
    let items = match document.find_node_before(offset) {
        Some(node) => {
            let mut engine = Engine {
                text: content,
                offset,
                node,
                schema,
                config,
                index: LineIndex::new(content),
                items: Vec::new(),
            };
            engine.run();
            engine.items
        }
        None => Vec::new(),
    };
    CompletionList {
        is_incomplete: false,
        items,
    }
}

struct Engine<'a> {
    text: &'a str,
    offset: usize,
    node: NodeRef<'a>,
    schema: &'a dyn SchemaProvider,
    config: &'a CompletionConfig,
    index: LineIndex<'a>,
    items: Vec<CompletionItem>,
}

impl<'a> Engine<'a> {
    fn run(&mut self) {
        let offset = self.offset;
        let mut scanner = Scanner::with_state(self.text, self.node.start, ScanState::WithinContent);
        let mut current_tag = "";
        let mut current_attribute = "";

        let mut token = scanner.next_token();
        while token != TokenKind::Eos && scanner.token_offset() <= offset {
            match token {
                TokenKind::StartTagOpen => {
                    if scanner.token_end() == offset {
                        let end = scan_next_for_end(&mut scanner, offset, TokenKind::StartTag);
                        return self.tag_suggestions(offset, end);
                    }
                }
                TokenKind::StartTag => {
                    if offset <= scanner.token_end() {
                        return self.open_tag_suggestions(scanner.token_offset(), scanner.token_end());
                    }
                    current_tag = scanner.token_text();
                }
                TokenKind::AttributeName => {
                    if offset <= scanner.token_end() {
                        return self.attribute_name_suggestions(
                            current_tag,
                            scanner.token_offset(),
                            scanner.token_end(),
                        );
                    }
                    current_attribute = scanner.token_text();
                }
                TokenKind::DelimiterAssign => {
                    if scanner.token_end() == offset {
                        let end = scan_next_for_end(&mut scanner, offset, TokenKind::AttributeValue);
                        return self.attribute_value_suggestions(current_tag, current_attribute, offset, end);
                    }
                }
                TokenKind::AttributeValue => {
                    if offset <= scanner.token_end() {
                        return self.attribute_value_suggestions(
                            current_tag,
                            current_attribute,
                            scanner.token_offset(),
                            scanner.token_end(),
                        );
                    }
                }
                TokenKind::Whitespace => {
                    if offset <= scanner.token_end() {
                        match scanner.state() {
                            ScanState::AfterOpeningStartTag => {
                                let start = scanner.token_offset();
                                let end = scan_next_for_end(&mut scanner, offset, TokenKind::StartTag);
                                return self.tag_suggestions(start, end);
                            }
                            ScanState::WithinTag(_) | ScanState::AfterAttributeName(_) => {
                                return self.attribute_name_suggestions(current_tag, scanner.token_end(), offset);
                            }
                            ScanState::BeforeAttributeValue(_) => {
                                return self.attribute_value_suggestions(
                                    current_tag,
                                    current_attribute,
                                    scanner.token_end(),
                                    offset,
                                );
                            }
                            ScanState::AfterOpeningEndTag => {
                                return self.close_tag_suggestions(scanner.token_offset() - 1, false, offset);
                            }
                            ScanState::WithinContent => return self.entity_suggestions(),
                            _ => {}
                        }
                    }
                }
                TokenKind::EndTagOpen => {
                    if offset <= scanner.token_end() {
                        let after_open_bracket = scanner.token_offset() + 1;
                        let end = scan_next_for_end(&mut scanner, offset, TokenKind::EndTag);
                        return self.close_tag_suggestions(after_open_bracket, false, end);
                    }
                }
                TokenKind::EndTag => {
                    if offset <= scanner.token_end() {
                        let bytes = self.text.as_bytes();
                        let mut start = scanner.token_offset();
                        while start > 0 {
                            start -= 1;
                            match bytes[start] {
                                b'/' => return self.close_tag_suggestions(start, false, scanner.token_end()),
                                b if b.is_ascii_whitespace() => continue,
                                _ => break,
                            }
                        }
                    }
                }
                TokenKind::StartTagClose => {
                    if offset <= scanner.token_end() && !current_tag.is_empty() {
                        return self.auto_close_suggestion(scanner.token_end(), current_tag);
                    }
                }
                TokenKind::Content => {
                    if offset <= scanner.token_end() {
                        return self.entity_suggestions();
                    }
                }
                _ => {
                    if offset <= scanner.token_end() {
                        return;
                    }
                }
            }
            token = scanner.next_token();
        }
    }

    // ── Tags ──────────────────────────────────────────────────────────

    fn tag_suggestions(&mut self, tag_start: usize, tag_end: usize) {
        self.open_tag_suggestions(tag_start, tag_end);
        self.close_tag_suggestions(tag_start, true, tag_end);
    }

    fn open_tag_suggestions(&mut self, after_open_bracket: usize, tag_name_end: usize) {
        let range = self.replace_range(after_open_bracket, tag_name_end);
        for spec in self.schema.tags() {
            self.items.push(CompletionItem {
                label: spec.name.clone(),
                kind: Some(CompletionItemKind::PROPERTY),
                documentation: Some(markdown(tag_markdown(spec))),
                text_edit: Some(replace(range, spec.name.clone())),
                insert_text_format: Some(InsertTextFormat::PLAIN_TEXT),
                ..Default::default()
            });
        }
    }

    /// Suggest closing the nearest element still waiting for its end tag,
    /// or any known tag when there is none. `after_open_bracket` is the
    /// offset just past `<`.
    fn close_tag_suggestions(&mut self, after_open_bracket: usize, in_open_tag: bool, tag_name_end: usize) {
        let range = self.replace_range(after_open_bracket, tag_name_end);
        let close = if is_followed_by(self.text, tag_name_end, ScanState::WithinEndTag, TokenKind::EndTagClose) {
            ""
        } else {
            ">"
        };

        // An element being typed cannot close itself.
        let mut curr = if in_open_tag { self.node.parent() } else { Some(self.node) };
        while let Some(node) = curr {
            if let Some(tag) = node.tag.as_deref() {
                if !node.closed || node.end_tag_start.is_some_and(|s| s > self.offset) {
                    let mut item = CompletionItem {
                        label: format!("/{tag}"),
                        kind: Some(CompletionItemKind::PROPERTY),
                        filter_text: Some(format!("/{tag}{close}")),
                        text_edit: Some(replace(range, format!("/{tag}{close}"))),
                        insert_text_format: Some(InsertTextFormat::PLAIN_TEXT),
                        ..Default::default()
                    };
                    let bracket = after_open_bracket.saturating_sub(1);
                    let start_indent = line_indent(self.text, node.start);
                    let end_indent = line_indent(self.text, bracket);
                    if let (Some(start_indent), Some(end_indent)) = (start_indent, end_indent) {
                        if start_indent != end_indent {
                            let range = self.replace_range(bracket - end_indent.len(), self.offset);
                            item.text_edit = Some(replace(range, format!("{start_indent}</{tag}{close}")));
                            item.filter_text = Some(format!("{end_indent}</{tag}{close}"));
                        }
                    }
                    self.items.push(item);
                    return;
                }
            }
            curr = node.parent();
        }
        if in_open_tag {
            return;
        }
        for spec in self.schema.tags() {
            self.items.push(CompletionItem {
                label: format!("/{}", spec.name),
                kind: Some(CompletionItemKind::PROPERTY),
                documentation: Some(markdown(tag_markdown(spec))),
                filter_text: Some(format!("/{}{close}", spec.name)),
                text_edit: Some(replace(range, format!("/{}{close}", spec.name))),
                insert_text_format: Some(InsertTextFormat::PLAIN_TEXT),
                ..Default::default()
            });
        }
    }

    /// `<view>|` offers `</view>` right after the cursor.
    fn auto_close_suggestion(&mut self, tag_close_end: usize, tag: &str) {
        if tags::is_void_element(tag) {
            return;
        }
        let close = format!("</{tag}>");
        let (new_text, format) = if self.config.use_snippet {
            (format!("$0{close}"), InsertTextFormat::SNIPPET)
        } else {
            (close.clone(), InsertTextFormat::PLAIN_TEXT)
        };
        let position = self.index.position(tag_close_end);
        self.items.push(CompletionItem {
            label: close.clone(),
            kind: Some(CompletionItemKind::PROPERTY),
            filter_text: Some(close),
            text_edit: Some(replace(Range::new(position, position), new_text)),
            insert_text_format: Some(format),
            ..Default::default()
        });
    }

    // ── Attributes ────────────────────────────────────────────────────

    fn attribute_name_suggestions(&mut self, tag: &str, name_start: usize, name_end: usize) {
        let tag = tag.to_ascii_lowercase();
        let bytes = self.text.as_bytes();
        // `<` may appear in a name token but most likely starts the next tag.
        let mut replace_end = self.offset;
        while replace_end < name_end && bytes[replace_end] != b'<' {
            replace_end += 1;
        }
        let range = self.replace_range(name_start, replace_end);
        let snippet = self.config.use_snippet
            && !is_followed_by(
                self.text,
                name_end,
                ScanState::AfterAttributeName(TagContext::default()),
                TokenKind::DelimiterAssign,
            );

        // The attribute being typed does not count as present.
        let mut seen: HashSet<String> = self
            .node
            .attributes
            .iter()
            .filter(|a| a.offset != name_start)
            .map(|a| a.name.clone())
            .collect();

        let mode = self.mode(&tag);
        for attr in schema::attributes_for(self.schema, &tag, mode) {
            if !seen.insert(attr.name.clone()) {
                continue;
            }
            if attr.kind == AttributeKind::Event {
                if !self.config.complete_event {
                    continue;
                }
                // `bind:tap` and `bindtap` are the same handler.
                if let Some(colon) = attr.name.find(':') {
                    let joined = format!("{}{}", &attr.name[..colon], &attr.name[colon + 1..]);
                    if !seen.insert(joined) {
                        continue;
                    }
                }
            }
            let with_value = snippet && attr.kind != AttributeKind::Boolean;
            let (new_text, format, command) = if with_value {
                (
                    format!("{}=\"$1\"", attr.name),
                    InsertTextFormat::SNIPPET,
                    Some(Command {
                        title: "Suggest".to_owned(),
                        command: TRIGGER_SUGGEST.to_owned(),
                        arguments: None,
                    }),
                )
            } else {
                (attr.name.clone(), InsertTextFormat::PLAIN_TEXT, None)
            };
            self.items.push(CompletionItem {
                label: attr.name.clone(),
                kind: Some(CompletionItemKind::FIELD),
                documentation: Some(markdown(attribute_markdown(&tag, attr))),
                text_edit: Some(replace(range, new_text)),
                insert_text_format: Some(format),
                command,
                ..Default::default()
            });
        }
    }

    fn attribute_value_suggestions(&mut self, tag: &str, attribute: &str, value_start: usize, value_end: usize) {
        let bytes = self.text.as_bytes();
        let offset = self.offset;
        let quoted = matches!(bytes.get(value_start), Some(b'"' | b'\''));
        let (range, add_quotes) = if offset > value_start && offset <= value_end && quoted {
            let content_start = value_start + 1;
            let mut content_end = value_end;
            // Exclude the closing quote when there is one.
            if value_end > value_start && bytes[value_end - 1] == bytes[value_start] {
                content_end -= 1;
            }
            let word_start = word_start(bytes, offset, content_start);
            let word_end = word_end(bytes, offset, content_end);
            (self.replace_range(word_start, word_end), false)
        } else {
            (self.replace_range(value_start, value_end), true)
        };

        let tag = tag.to_ascii_lowercase();
        let attribute = attribute.to_ascii_lowercase();
        let mode = self.mode(&tag);
        let mut seen = HashSet::new();
        for value in schema::values_for(self.schema, &tag, &attribute, mode) {
            if !seen.insert(value.value.clone()) {
                continue;
            }
            let insert = if add_quotes {
                format!("\"{}\"", value.value)
            } else {
                value.value.clone()
            };
            self.items.push(CompletionItem {
                label: value.value,
                kind: Some(CompletionItemKind::ENUM),
                documentation: value.desc.map(Documentation::String),
                filter_text: Some(insert.clone()),
                text_edit: Some(replace(range, insert)),
                insert_text_format: Some(InsertTextFormat::PLAIN_TEXT),
                ..Default::default()
            });
        }
    }

    /// Value of the node's mode attribute, when `tag` has one.
    fn mode(&self, tag: &str) -> Option<&'a str> {
        let spec = self.schema.tag(tag)?;
        let mode = spec.mode_attribute()?;
        self.node.node().attribute_value(&mode.name)
    }

    // ── Entities ──────────────────────────────────────────────────────

    fn entity_suggestions(&mut self) {
        let bytes = self.text.as_bytes();
        let mut k = self.offset;
        while k > 0 && bytes[k - 1].is_ascii_alphanumeric() {
            k -= 1;
        }
        if k == 0 || bytes[k - 1] != b'&' {
            return;
        }
        let range = self.replace_range(k - 1, self.offset);
        for (name, value) in entities::ENTITIES {
            if !name.ends_with(';') {
                continue;
            }
            let label = format!("&{name}");
            self.items.push(CompletionItem {
                label: label.clone(),
                kind: Some(CompletionItemKind::KEYWORD),
                documentation: Some(Documentation::String(format!(
                    "Character entity representing '{value}'"
                ))),
                text_edit: Some(replace(range, label)),
                insert_text_format: Some(InsertTextFormat::PLAIN_TEXT),
                ..Default::default()
            });
        }
    }

    // ── Helpers ───────────────────────────────────────────────────────

    /// `start..end`, with `start` pulled back to the cursor if it lies after it.
    fn replace_range(&self, start: usize, end: usize) -> Range {
        self.index.range(start.min(self.offset), end)
    }
}

/// When the cursor sits at the end of the current token, peek at the next
/// one: if it is `next` and starts at the cursor, the replace range extends
/// to its end.
fn scan_next_for_end(scanner: &mut Scanner<'_>, offset: usize, next: TokenKind) -> usize {
    if offset == scanner.token_end() {
        let token = scanner.next_token();
        if token == next && scanner.token_offset() == offset {
            return scanner.token_end();
        }
    }
    offset
}

fn is_followed_by(text: &str, offset: usize, state: ScanState, expected: TokenKind) -> bool {
    let mut scanner = Scanner::with_state(text, offset, state);
    let mut token = scanner.next_token();
    while token == TokenKind::Whitespace {
        token = scanner.next_token();
    }
    token == expected
}

/// Leading whitespace of the line containing `offset`, when only
/// whitespace precedes `offset` on that line.
fn line_indent(text: &str, offset: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut start = offset;
    while start > 0 {
        match bytes[start - 1] {
            b'\n' | b'\r' => return Some(&text[start..offset]),
            b if b.is_ascii_whitespace() => start -= 1,
            _ => return None,
        }
    }
    Some(&text[..offset])
}

fn word_start(bytes: &[u8], mut offset: usize, limit: usize) -> usize {
    while offset > limit && !bytes[offset - 1].is_ascii_whitespace() {
        offset -= 1;
    }
    offset
}

fn word_end(bytes: &[u8], mut offset: usize, limit: usize) -> usize {
    while offset < limit && !bytes[offset].is_ascii_whitespace() {
        offset += 1;
    }
    offset
}

fn replace(range: Range, new_text: String) -> CompletionTextEdit {
    CompletionTextEdit::Edit(TextEdit::new(range, new_text))
}

fn markdown(value: String) -> Documentation {
    Documentation::MarkupContent(MarkupContent {
        kind: MarkupKind::Markdown,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indentation_of_a_line() {
        let text = "<view>\n  <text>\n  </";
        assert_eq!(line_indent(text, 0), Some(""));
        assert_eq!(line_indent(text, 9), Some("  "));
        assert_eq!(line_indent(text, 8), Some(" "));
        assert_eq!(line_indent(text, 12), None);
    }

    #[test]
    fn words_stop_at_whitespace() {
        let bytes = b"\"a bc d\"";
        assert_eq!(word_start(bytes, 4, 1), 3);
        assert_eq!(word_end(bytes, 4, 7), 5);
        assert_eq!(word_start(bytes, 1, 1), 1);
    }

    #[test]
    fn equals_sign_is_seen_past_whitespace() {
        let text = "<view class  = \"a\">";
        let state = ScanState::AfterAttributeName(TagContext::default());
        assert!(is_followed_by(text, 11, state, TokenKind::DelimiterAssign));
        assert!(!is_followed_by("<view class>", 11, state, TokenKind::DelimiterAssign));
    }
}

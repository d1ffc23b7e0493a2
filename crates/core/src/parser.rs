//! Tree builder: one forward pass over the scanner's tokens.
//!
//! The builder never fails. Every scanner error and every structural problem
//! is recorded on the returned [`Document`] and building carries on, so the
//! tree is always usable by completion and hover even for half-typed input.

use crate::error::ParseError;
use crate::node::{Attribute, Document, NodeId};
use crate::scanner::{Scanner, TokenKind};
use crate::tags;

pub const ERR_TAG_NAME_CHARS: &str = "Only [a-z] _ - allowed for tag name";
pub const ERR_DOUBLE_QUOTE: &str = "Double quote required for value";

/// A start tag still waiting for its end tag.
struct OpenTag {
    name: String,
    start: usize,
    end: usize,
}

pub fn parse(text: &str) -> Document {
    let mut doc = Document::new(text.len());
    let mut scanner = Scanner::new(text);
    let mut curr = NodeId::ROOT;
    let mut end_tag_start: Option<usize> = None;
    let mut pending_attribute: Option<usize> = None;
    let mut open_tags: Vec<OpenTag> = Vec::new();

    loop {
        let token = scanner.next_token();
        if token == TokenKind::Eos {
            break;
        }
        let (start, end) = (scanner.token_offset(), scanner.token_end());
        if let Some(message) = scanner.token_error() {
            doc.push_error(ParseError::new(message, start, end));
        }

        match token {
            TokenKind::StartTagOpen => {
                curr = doc.push_child(curr, start, text.len());
            }
            TokenKind::StartTag => {
                let name = scanner.token_text();
                doc.node_mut(curr).tag = Some(name.to_owned());
                open_tags.push(OpenTag {
                    name: name.to_ascii_lowercase(),
                    start,
                    end,
                });
                if !is_valid_tag_name(name) {
                    doc.push_error(ParseError::new(ERR_TAG_NAME_CHARS, start, end));
                }
            }
            TokenKind::StartTagClose => {
                let node = doc.node_mut(curr);
                node.end = end;
                if let Some(parent) = node.parent {
                    if node.tag.as_deref().is_some_and(tags::is_void_element) {
                        node.closed = true;
                        curr = parent;
                        // Void elements never wait for an end tag.
                        open_tags.pop();
                    }
                }
            }
            TokenKind::EndTagOpen => {
                end_tag_start = Some(start);
            }
            TokenKind::EndTag => {
                let close_tag = scanner.token_text().to_ascii_lowercase();
                let tag_start = end_tag_start.unwrap_or(start);
                if let Some(void) = redundant_void_end_tag(text, &doc, curr, &close_tag, tag_start) {
                    // `<image></image>`: the end tag belongs to the void child.
                    doc.node_mut(void).end_tag_start = Some(tag_start);
                    curr = void;
                    continue;
                }
                // Force-close everything between here and the matching element.
                loop {
                    let node = doc.node_mut(curr);
                    if node.is_same_tag(&close_tag) {
                        break;
                    }
                    let Some(parent) = node.parent else { break };
                    node.end = tag_start;
                    node.closed = false;
                    curr = parent;
                }
                if curr != NodeId::ROOT {
                    let node = doc.node_mut(curr);
                    node.closed = true;
                    node.end_tag_start = Some(tag_start);
                }
                match open_tags.pop() {
                    None => doc.push_error(ParseError::new(
                        format!("Start tag not found for <{close_tag}>"),
                        start,
                        end,
                    )),
                    Some(open) if open.name != close_tag => doc.push_error(ParseError::new(
                        format!("Close tag not found for <{}>", open.name),
                        open.start,
                        open.end,
                    )),
                    Some(_) => {}
                }
            }
            TokenKind::StartTagSelfClose => {
                let node = doc.node_mut(curr);
                if let Some(parent) = node.parent {
                    node.closed = true;
                    node.end = end;
                    curr = parent;
                }
                open_tags.pop();
            }
            TokenKind::EndTagClose => {
                let node = doc.node_mut(curr);
                if let Some(parent) = node.parent {
                    node.end = end;
                    curr = parent;
                }
            }
            TokenKind::AttributeName => {
                let name = scanner.token_text();
                if !is_valid_attribute_name(name) {
                    doc.push_error(ParseError::new(format!("Invalid attribute {name}"), start, end - 1));
                }
                let node = doc.node_mut(curr);
                node.attributes.push(Attribute {
                    name: name.to_owned(),
                    offset: start,
                    value: None,
                });
                pending_attribute = Some(node.attributes.len() - 1);
            }
            TokenKind::AttributeValue => {
                let raw = scanner.token_text();
                if !is_double_quoted(raw) {
                    doc.push_error(ParseError::new(ERR_DOUBLE_QUOTE, start, end - 1));
                }
                if let Some(index) = pending_attribute.take() {
                    if let Some(attribute) = doc.node_mut(curr).attributes.get_mut(index) {
                        attribute.value = Some(unquote(raw).to_owned());
                    }
                }
            }
            TokenKind::Content => {
                let content = scanner.token_text().trim();
                if !content.is_empty() {
                    doc.node_mut(curr).text_contents.push(content.to_owned());
                }
            }
            _ => {}
        }
    }

    // Whatever is still open runs to the end of the text.
    while let Some(parent) = doc.node_mut(curr).parent {
        let node = doc.node_mut(curr);
        node.end = text.len();
        node.closed = false;
        curr = parent;
    }
    for open in open_tags {
        doc.push_error(ParseError::new(
            format!("Close tag not found for <{}>", open.name),
            open.start,
            open.end - 1,
        ));
    }

    doc
}

/// The last child of `curr` when it is a void element named `close_tag`
/// that ended right before this end tag (only whitespace in between) and has
/// not been given one yet.
fn redundant_void_end_tag(
    text: &str,
    doc: &Document,
    curr: NodeId,
    close_tag: &str,
    tag_start: usize,
) -> Option<NodeId> {
    if doc.get(curr).is_same_tag(close_tag) || !tags::is_void_element(close_tag) {
        return None;
    }
    let child = doc.get(curr).last_child()?;
    let adjacent = text
        .get(child.end..tag_start)
        .is_some_and(|between| between.trim().is_empty());
    (child.is_same_tag(close_tag) && child.closed && adjacent && child.end_tag_start.is_none())
        .then(|| child.id())
}

/// `[a-z][a-z0-9_-]*`
fn is_valid_tag_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    bytes.next().is_some_and(|b| b.is_ascii_lowercase())
        && bytes.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}

/// `[a-zA-Z][\w:.-]*`
fn is_valid_attribute_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    bytes.next().is_some_and(|b| b.is_ascii_alphabetic())
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b':' | b'.' | b'-'))
}

fn is_double_quoted(value: &str) -> bool {
    value.len() >= 2 && value.starts_with('"') && value.ends_with('"')
}

fn unquote(value: &str) -> &str {
    let value = value.strip_prefix('"').unwrap_or(value);
    value.strip_suffix('"').unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_name_rules() {
        assert!(is_valid_tag_name("view"));
        assert!(is_valid_tag_name("scroll-view"));
        assert!(is_valid_tag_name("my_comp2"));
        assert!(!is_valid_tag_name("View"));
        assert!(!is_valid_tag_name("2view"));
        assert!(!is_valid_tag_name("a.b"));
    }

    #[test]
    fn attribute_name_rules() {
        assert!(is_valid_attribute_name("class"));
        assert!(is_valid_attribute_name("wx:for-item"));
        assert!(is_valid_attribute_name("bind.tap"));
        assert!(is_valid_attribute_name("data-Id_2"));
        assert!(!is_valid_attribute_name("x#y"));
        assert!(!is_valid_attribute_name("@tap"));
        assert!(!is_valid_attribute_name("1a"));
    }

    #[test]
    fn unquote_strips_one_quote_each_side() {
        assert_eq!(unquote("\"abc\""), "abc");
        assert_eq!(unquote("\"\""), "");
        assert_eq!(unquote("\""), "");
        assert_eq!(unquote("'abc'"), "'abc'");
        assert_eq!(unquote("abc"), "abc");
    }

    #[test]
    fn builds_nested_tree() {
        let doc = parse("<view class=\"a\"><text>hi</text><icon></view>");
        assert!(doc.errors().is_empty(), "errors: {:?}", doc.errors());
        let view = doc.roots().next().expect("root element");
        assert_eq!(view.tag.as_deref(), Some("view"));
        assert_eq!(view.attribute_value("class"), Some("a"));
        let children: Vec<_> = view.children().filter_map(|c| c.tag.clone()).collect();
        assert_eq!(children, ["text", "icon"]);
        let text = view.first_child().expect("text child");
        assert_eq!((text.start, text.end, text.end_tag_start), (16, 31, Some(24)));
        assert_eq!(text.text_contents, ["hi"]);
    }

    #[test]
    fn single_quoted_value_is_reported() {
        let doc = parse("<view id='a'></view>");
        assert_eq!(doc.errors().len(), 1, "errors: {:?}", doc.errors());
        assert_eq!(doc.errors()[0].message, ERR_DOUBLE_QUOTE);
        assert_eq!((doc.errors()[0].start, doc.errors()[0].end), (9, 11));
    }
}

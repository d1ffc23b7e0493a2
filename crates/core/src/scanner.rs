//! Resumable tokenizer for WXML text.
//!
//! The scanner hands out one token per [`Scanner::next_token`] call. Everything
//! that influences later tokens lives in [`ScanState`], so a scanner built
//! with [`Scanner::with_state`] at some offset produces exactly the tokens a
//! scan from offset 0 would have produced from there on. Completion relies on
//! this to rescan from the start of a node instead of the whole document.
//!
//! Malformed input never stops the scanner: problems are attached to the
//! token as an error message and scanning carries on.

use serde::Serialize;

use crate::tags;

pub const ERR_TAG_NAME_MUST_FOLLOW: &str = "Tag name must directly follow the open bracket.";
pub const ERR_UNEXPECTED_IN_TAG: &str = "Unexpected character in tag.";
pub const ERR_CLOSING_BRACKET: &str = "Closing bracket expected.";
pub const ERR_END_TAG_NAME: &str = "End tag name expected.";
pub const ERR_CLOSING_QUOTE: &str = "Closing quote expected.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    StartCommentTag,
    Comment,
    EndCommentTag,
    StartTagOpen,
    StartTag,
    StartTagClose,
    StartTagSelfClose,
    EndTagOpen,
    EndTag,
    EndTagClose,
    DelimiterAssign,
    AttributeName,
    AttributeValue,
    Content,
    Whitespace,
    Script,
    Unknown,
    Eos,
}

/// How the body of the tag being scanned is tokenized once its `>` is seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum RawText {
    #[default]
    None,
    /// `<wxs>` bodies become [`TokenKind::Script`] tokens.
    Script,
    /// `<style>` bodies become a single [`TokenKind::Content`] run.
    Style,
}

/// Per-tag context carried by the in-tag states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct TagContext {
    pub raw_text: RawText,
    /// Whitespace was seen since the tag name or the last attribute value.
    /// Attribute names are only recognised after whitespace.
    pub after_whitespace: bool,
}

impl TagContext {
    fn with_whitespace(self, after_whitespace: bool) -> Self {
        TagContext {
            after_whitespace,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ScanState {
    #[default]
    WithinContent,
    AfterOpeningStartTag,
    AfterOpeningEndTag,
    WithinDoctype,
    WithinTag(TagContext),
    WithinEndTag,
    WithinComment,
    WithinScriptContent,
    WithinStyleContent,
    AfterAttributeName(TagContext),
    BeforeAttributeValue(TagContext),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
    pub len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl Token {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

pub struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    state: ScanState,
    token_kind: TokenKind,
    token_offset: usize,
    token_error: Option<&'static str>,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Scanner::with_state(src, 0, ScanState::WithinContent)
    }

    /// Resume scanning at `offset` in `state`.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is past the end of `src` or not on a character
    /// boundary.
    pub fn with_state(src: &'a str, offset: usize, state: ScanState) -> Self {
        assert!(
            src.is_char_boundary(offset),
            "scan offset {offset} is outside the text (len {}) or splits a character",
            src.len()
        );
        Scanner {
            src,
            pos: offset,
            state,
            token_kind: TokenKind::Unknown,
            token_offset: offset,
            token_error: None,
        }
    }

    /// Advance to the next token. Returns [`TokenKind::Eos`] forever once
    /// the end of the text is reached.
    pub fn next_token(&mut self) -> TokenKind {
        let offset = self.pos;
        let kind = self.internal_scan();
        if kind != TokenKind::Eos && offset == self.pos {
            // Every token except end-of-stream consumes at least one character.
            self.advance_char();
            return self.finish(offset, TokenKind::Unknown, None);
        }
        kind
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn token_kind(&self) -> TokenKind {
        self.token_kind
    }

    pub fn token_offset(&self) -> usize {
        self.token_offset
    }

    pub fn token_len(&self) -> usize {
        self.pos - self.token_offset
    }

    pub fn token_end(&self) -> usize {
        self.pos
    }

    pub fn token_text(&self) -> &'a str {
        &self.src[self.token_offset..self.pos]
    }

    pub fn token_error(&self) -> Option<&'static str> {
        self.token_error
    }

    pub fn token(&self) -> Token {
        Token {
            kind: self.token_kind,
            offset: self.token_offset,
            len: self.token_len(),
            error: self.token_error,
        }
    }

    fn finish(&mut self, offset: usize, kind: TokenKind, error: Option<&'static str>) -> TokenKind {
        self.token_kind = kind;
        self.token_offset = offset;
        self.token_error = error;
        kind
    }

    fn internal_scan(&mut self) -> TokenKind {
        let offset = self.pos;
        if self.eos() {
            return self.finish(offset, TokenKind::Eos, None);
        }

        match self.state {
            ScanState::WithinComment => {
                if self.advance_if_str("-->") {
                    self.state = ScanState::WithinContent;
                    return self.finish(offset, TokenKind::EndCommentTag, None);
                }
                self.advance_until_str("-->");
                self.finish(offset, TokenKind::Comment, None)
            }
            ScanState::WithinDoctype => {
                if self.advance_if(b'>') {
                    self.state = ScanState::WithinContent;
                    return self.finish(offset, TokenKind::Unknown, None);
                }
                self.advance_until(b'>');
                self.finish(offset, TokenKind::Unknown, None)
            }
            ScanState::WithinContent => {
                if self.advance_if(b'<') {
                    if self.peek() == Some(b'!') {
                        if self.advance_if_str("!--") {
                            self.state = ScanState::WithinComment;
                            return self.finish(offset, TokenKind::StartCommentTag, None);
                        }
                        if self.advance_if_str_ignore_case("!doctype") {
                            self.state = ScanState::WithinDoctype;
                            return self.finish(offset, TokenKind::Unknown, None);
                        }
                    }
                    if self.advance_if(b'/') {
                        self.state = ScanState::AfterOpeningEndTag;
                        return self.finish(offset, TokenKind::EndTagOpen, None);
                    }
                    self.state = ScanState::AfterOpeningStartTag;
                    return self.finish(offset, TokenKind::StartTagOpen, None);
                }
                self.advance_until(b'<');
                self.finish(offset, TokenKind::Content, None)
            }
            ScanState::AfterOpeningEndTag => {
                if self.next_element_name() > 0 {
                    self.state = ScanState::WithinEndTag;
                    return self.finish(offset, TokenKind::EndTag, None);
                }
                if self.skip_whitespace() {
                    return self.finish(offset, TokenKind::Whitespace, Some(ERR_TAG_NAME_MUST_FOLLOW));
                }
                self.state = ScanState::WithinEndTag;
                self.advance_until(b'>');
                if offset < self.pos {
                    return self.finish(offset, TokenKind::Unknown, Some(ERR_END_TAG_NAME));
                }
                self.internal_scan()
            }
            ScanState::WithinEndTag => {
                if self.skip_whitespace() {
                    return self.finish(offset, TokenKind::Whitespace, None);
                }
                if self.advance_if(b'>') {
                    self.state = ScanState::WithinContent;
                    return self.finish(offset, TokenKind::EndTagClose, None);
                }
                self.advance_char();
                self.finish(offset, TokenKind::Unknown, Some(ERR_CLOSING_BRACKET))
            }
            ScanState::AfterOpeningStartTag => {
                if self.next_element_name() > 0 {
                    let name = &self.src[offset..self.pos];
                    self.state = ScanState::WithinTag(TagContext {
                        raw_text: tags::raw_text_kind(name),
                        after_whitespace: false,
                    });
                    return self.finish(offset, TokenKind::StartTag, None);
                }
                if self.skip_whitespace() {
                    return self.finish(offset, TokenKind::Whitespace, Some(ERR_TAG_NAME_MUST_FOLLOW));
                }
                self.state = ScanState::WithinTag(TagContext::default());
                self.internal_scan()
            }
            ScanState::WithinTag(ctx) => {
                if self.skip_whitespace() {
                    self.state = ScanState::WithinTag(ctx.with_whitespace(true));
                    return self.finish(offset, TokenKind::Whitespace, None);
                }
                if ctx.after_whitespace && self.next_attribute_name() > 0 {
                    self.state = ScanState::AfterAttributeName(ctx.with_whitespace(false));
                    return self.finish(offset, TokenKind::AttributeName, None);
                }
                if self.advance_if_str("/>") {
                    self.state = ScanState::WithinContent;
                    return self.finish(offset, TokenKind::StartTagSelfClose, None);
                }
                if self.advance_if(b'>') {
                    self.state = match ctx.raw_text {
                        RawText::None => ScanState::WithinContent,
                        RawText::Script => ScanState::WithinScriptContent,
                        RawText::Style => ScanState::WithinStyleContent,
                    };
                    return self.finish(offset, TokenKind::StartTagClose, None);
                }
                self.advance_char();
                self.finish(offset, TokenKind::Unknown, Some(ERR_UNEXPECTED_IN_TAG))
            }
            ScanState::AfterAttributeName(ctx) => {
                if self.skip_whitespace() {
                    self.state = ScanState::AfterAttributeName(ctx.with_whitespace(true));
                    return self.finish(offset, TokenKind::Whitespace, None);
                }
                if self.advance_if(b'=') {
                    self.state = ScanState::BeforeAttributeValue(ctx);
                    return self.finish(offset, TokenKind::DelimiterAssign, None);
                }
                self.state = ScanState::WithinTag(ctx);
                self.internal_scan()
            }
            ScanState::BeforeAttributeValue(ctx) => {
                if self.skip_whitespace() {
                    return self.finish(offset, TokenKind::Whitespace, None);
                }
                let next = ScanState::WithinTag(ctx.with_whitespace(false));
                if self.next_unquoted_value() > 0 {
                    self.state = next;
                    return self.finish(offset, TokenKind::AttributeValue, None);
                }
                if let Some(quote @ (b'"' | b'\'')) = self.peek() {
                    self.pos += 1;
                    let error = if self.advance_until(quote) {
                        self.pos += 1;
                        None
                    } else {
                        Some(ERR_CLOSING_QUOTE)
                    };
                    self.state = next;
                    return self.finish(offset, TokenKind::AttributeValue, error);
                }
                self.state = next;
                self.internal_scan()
            }
            ScanState::WithinScriptContent => {
                self.scan_raw_text(offset, tags::SCRIPT_TAG, TokenKind::Script)
            }
            ScanState::WithinStyleContent => {
                self.scan_raw_text(offset, tags::STYLE_TAG, TokenKind::Content)
            }
        }
    }

    /// Body of a raw-text element: everything up to `</tag`, matched without
    /// regard to case.
    fn scan_raw_text(&mut self, offset: usize, tag: &str, kind: TokenKind) -> TokenKind {
        match self.find_end_tag(tag) {
            Some(end) if end > self.pos => {
                self.pos = end;
                self.state = ScanState::WithinContent;
                self.finish(offset, kind, None)
            }
            Some(_) => {
                self.state = ScanState::WithinContent;
                self.internal_scan()
            }
            None => {
                self.pos = self.src.len();
                self.finish(offset, kind, None)
            }
        }
    }

    fn find_end_tag(&self, tag: &str) -> Option<usize> {
        let bytes = self.src.as_bytes();
        self.src[self.pos..]
            .match_indices("</")
            .map(|(i, _)| self.pos + i)
            .find(|&at| {
                bytes
                    .get(at + 2..at + 2 + tag.len())
                    .is_some_and(|name| name.eq_ignore_ascii_case(tag.as_bytes()))
            })
    }

    // ── Character stream helpers ─────────────────────────────────────────

    fn eos(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn advance_char(&mut self) {
        let width = self.src[self.pos..].chars().next().map_or(0, char::len_utf8);
        self.pos += width;
    }

    fn advance_if(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn advance_if_str(&mut self, s: &str) -> bool {
        if self.src[self.pos..].starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn advance_if_str_ignore_case(&mut self, s: &str) -> bool {
        let bytes = self.src.as_bytes();
        match bytes.get(self.pos..self.pos + s.len()) {
            Some(candidate) if candidate.eq_ignore_ascii_case(s.as_bytes()) => {
                self.pos += s.len();
                true
            }
            _ => false,
        }
    }

    /// Move to the next `b`, or to the end of the text. Returns whether `b`
    /// was found.
    fn advance_until(&mut self, b: u8) -> bool {
        match self.src.as_bytes()[self.pos..].iter().position(|&c| c == b) {
            Some(i) => {
                self.pos += i;
                true
            }
            None => {
                self.pos = self.src.len();
                false
            }
        }
    }

    fn advance_until_str(&mut self, s: &str) -> bool {
        match self.src[self.pos..].find(s) {
            Some(i) => {
                self.pos += i;
                true
            }
            None => {
                self.pos = self.src.len();
                false
            }
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if !is_whitespace(b) {
                break;
            }
            self.pos += 1;
        }
        self.pos > start
    }

    /// `[_:\w][_:\w\-.]*`
    fn next_element_name(&mut self) -> usize {
        let start = self.pos;
        let bytes = self.src.as_bytes();
        match self.peek() {
            Some(b) if b == b'_' || b == b':' || b.is_ascii_alphanumeric() => self.pos += 1,
            _ => return 0,
        }
        while let Some(&b) = bytes.get(self.pos) {
            if !(b.is_ascii_alphanumeric() || matches!(b, b'_' | b':' | b'-' | b'.')) {
                break;
            }
            self.pos += 1;
        }
        self.pos - start
    }

    fn next_attribute_name(&mut self) -> usize {
        self.advance_chars_while(|c| {
            !(c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '>' | '/' | '='))
        })
    }

    fn next_unquoted_value(&mut self) -> usize {
        self.advance_chars_while(|c| {
            !(c.is_whitespace() || matches!(c, '"' | '\'' | '`' | '=' | '<' | '>' | '/'))
        })
    }

    fn advance_chars_while(&mut self, accept: impl Fn(char) -> bool) -> usize {
        let start = self.pos;
        let len: usize = self.src[self.pos..]
            .chars()
            .take_while(|&c| accept(c))
            .map(char::len_utf8)
            .sum();
        self.pos += len;
        self.pos - start
    }
}

impl Iterator for Scanner<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        match self.next_token() {
            TokenKind::Eos => None,
            _ => Some(self.token()),
        }
    }
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
}

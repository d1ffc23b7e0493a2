//! Diagnostics for a parsed document: parse errors, structural rules, and
//! attribute checks against the schema.

use std::path::{Component, Path, PathBuf};

use lsp_types::{Diagnostic, DiagnosticSeverity};
use wxml_core::schema::{self, AttributeKind, AttributeSpec, SchemaProvider, TagSpec};
use wxml_core::{tags, Attribute, Document, NodeRef};

use crate::line_index::LineIndex;

pub const SOURCE: &str = "wxml";

/// All diagnostics for `document`, parse errors first, then one pre-order
/// walk over the tree. `path` is the document's location on disk, needed to
/// resolve `<include src>` and `<import src>`.
pub fn compute_diagnostics(
    content: &str,
    document: &Document,
    schema: &dyn SchemaProvider,
    path: Option<&Path>,
) -> Vec<Diagnostic> {
    let mut checker = Checker {
        index: LineIndex::new(content),
        schema,
        base_dir: path.and_then(Path::parent),
        out: Vec::new(),
    };
    for error in document.errors() {
        checker.error(error.start, error.end, format!("Parse error: {}", error.message));
    }
    for node in document.descendants() {
        checker.check_node(&node);
    }
    checker.out
}

struct Checker<'a> {
    index: LineIndex<'a>,
    schema: &'a dyn SchemaProvider,
    base_dir: Option<&'a Path>,
    out: Vec<Diagnostic>,
}

impl Checker<'_> {
    fn check_node(&mut self, node: &NodeRef<'_>) {
        let Some(tag) = node.tag.as_deref() else {
            return;
        };
        if tags::is_empty_element(tag) && !node.is_empty() {
            self.error(node.start, node.end, "Empty tag should not have children".to_owned());
        }
        if tag == "text" {
            for child in node.children() {
                if let Some(child_tag) = child.tag.as_deref().filter(|t| *t != "text") {
                    self.error(child.start, child.end, format!("{child_tag} not allowed in <text>"));
                }
            }
        }
        if tag == "include" || tag == "import" {
            self.check_src(node);
        }
        for name in node.duplicated_attributes() {
            for offset in node.attribute_offsets(name) {
                self.error(offset, offset + name.len(), format!("Duplicated attribute \"{name}\""));
            }
        }
        let schema = self.schema;
        if let Some(spec) = schema.tag(tag) {
            self.check_attributes(node, spec);
        }
    }

    fn check_src(&mut self, node: &NodeRef<'_>) {
        let Some(dir) = self.base_dir else {
            return;
        };
        let Some(attr) = node.attributes.iter().find(|a| a.name == "src") else {
            return;
        };
        let (Some(value), Some(start)) = (attr.value.as_deref(), attr.value_offset()) else {
            return;
        };
        if value.is_empty() || is_dynamic_value(value) {
            return;
        }
        let target = normalize(&dir.join(value));
        if !target.exists() {
            self.error(start, start + value.len(), format!("File {} not exist", target.display()));
        }
    }

    fn check_attributes(&mut self, node: &NodeRef<'_>, spec: &TagSpec) {
        let mode = spec
            .mode_attribute()
            .and_then(|m| node.attribute_value(&m.name));
        let allowed = schema::attributes_for(self.schema, &spec.name, mode);
        for attr in &node.attributes {
            if attr.name.starts_with("data-") {
                continue;
            }
            match allowed.iter().find(|a| a.name == attr.name) {
                Some(decl) => self.check_value(attr, decl),
                None => self.error(
                    attr.offset,
                    attr.end(),
                    format!("Unknown attribute \"{}\"", attr.name),
                ),
            }
        }
    }

    fn check_value(&mut self, attr: &Attribute, decl: &AttributeSpec) {
        let name = attr.name.as_str();
        let value = attr.value.as_deref().filter(|v| !v.is_empty());
        if name == "wx:else" {
            if value.is_some() {
                self.push(
                    attr.offset,
                    attr.end(),
                    DiagnosticSeverity::WARNING,
                    format!("Unnecessary value for \"{name}\""),
                );
            }
            return;
        }
        if value.is_some_and(is_dynamic_value) {
            return;
        }
        let value_start = attr.value_offset().unwrap_or(attr.offset);
        match &decl.kind {
            AttributeKind::Logic | AttributeKind::Iterate | AttributeKind::Event | AttributeKind::Function => {
                match value {
                    None => self.error(
                        attr.offset,
                        attr.end(),
                        format!("Value required for attribute \"{name}\""),
                    ),
                    Some(_) if name == "wx:for" || name == "wx:for-items" => self.error(
                        attr.offset,
                        attr.end(),
                        format!("Expression required for attribute \"{name}\""),
                    ),
                    Some(_) => {}
                }
            }
            AttributeKind::Boolean => {
                if let Some(v) = value.filter(|v| *v != "true" && *v != "false") {
                    self.error(
                        value_start,
                        value_start + v.len(),
                        format!("Invalid value for boolean attribute \"{name}\""),
                    );
                }
            }
            AttributeKind::Number => {
                if let Some(v) = value.filter(|v| !is_number(v)) {
                    self.error(
                        value_start,
                        value_start + v.len(),
                        format!("Invalid value for number attribute \"{name}\""),
                    );
                }
            }
            AttributeKind::String | AttributeKind::Enum { .. } => match value {
                None if !decl.has_default() => self.error(
                    value_start,
                    value_start + 1,
                    format!("Value required for attribute \"{name}\""),
                ),
                Some(v) => {
                    if let AttributeKind::Enum { values } = &decl.kind {
                        if !values.is_empty() && !values.iter().any(|e| e.value == v) {
                            self.error(
                                value_start,
                                value_start + v.len(),
                                format!("Invalid value for enum attribute \"{name}\""),
                            );
                        }
                    }
                }
                None => {}
            },
        }
    }

    fn error(&mut self, start: usize, end: usize, message: String) {
        self.push(start, end, DiagnosticSeverity::ERROR, message);
    }

    fn push(&mut self, start: usize, end: usize, severity: DiagnosticSeverity, message: String) {
        self.out.push(Diagnostic {
            range: self.index.range(start, end),
            severity: Some(severity),
            source: Some(SOURCE.to_owned()),
            message,
            ..Default::default()
        });
    }
}

/// `{{ expr }}`: checked at runtime, never here.
fn is_dynamic_value(value: &str) -> bool {
    value.len() > 4 && value.starts_with("{{") && value.ends_with("}}")
}

/// `-?\d+(\.\d+)?`
fn is_number(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(int) && frac.map_or(true, all_digits)
}

/// Resolve `.` and `..` without touching the file system.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_shapes() {
        for ok in ["0", "42", "-3", "1.5", "-0.25"] {
            assert!(is_number(ok), "{ok}");
        }
        for bad in ["", "-", "1.", ".5", "1e3", "abc", "1.2.3", "+1"] {
            assert!(!is_number(bad), "{bad}");
        }
    }

    #[test]
    fn dynamic_values() {
        assert!(is_dynamic_value("{{a}}"));
        assert!(is_dynamic_value("{{ list.length > 0 }}"));
        assert!(!is_dynamic_value("{{}}"));
        assert!(!is_dynamic_value("a {{b}}"));
        assert!(!is_dynamic_value("{{a}} b"));
    }

    #[test]
    fn lexical_normalization() {
        assert_eq!(
            normalize(Path::new("/proj/pages/index/../../common/./head.wxml")),
            PathBuf::from("/proj/common/head.wxml")
        );
    }
}

//! Component knowledge: which tags exist, which attributes they take, and
//! what values those attributes accept.
//!
//! Consumers go through the [`SchemaProvider`] trait so the built-in table
//! can be swapped for project-specific data. The free functions in this
//! module layer the language-level attributes (`id`, `class`, events,
//! `wx:if` and friends) on top of whatever a provider declares for a tag.

mod builtin;

use std::collections::HashSet;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

pub use builtin::BuiltinSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

impl EnumValue {
    pub fn new(value: &str) -> Self {
        EnumValue {
            value: value.to_owned(),
            desc: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum AttributeKind {
    String,
    Boolean,
    Number,
    Enum { values: Vec<EnumValue> },
    /// `bindtap`, `catch:touchstart`, ...
    Event,
    /// `wx:else`, `wx:key` and other directives taking an expression or nothing.
    Logic,
    /// `wx:for` and its aliases.
    Iterate,
    /// Callback attributes on components.
    Function,
}

impl AttributeKind {
    pub fn label(&self) -> &'static str {
        match self {
            AttributeKind::String => "string",
            AttributeKind::Boolean => "boolean",
            AttributeKind::Number => "number",
            AttributeKind::Enum { .. } => "enum",
            AttributeKind::Event => "event",
            AttributeKind::Logic => "logic",
            AttributeKind::Iterate => "iterate",
            AttributeKind::Function => "function",
        }
    }

    /// Values offered for completion.
    pub fn values(&self) -> Vec<EnumValue> {
        match self {
            AttributeKind::Boolean => vec![EnumValue::new("true"), EnumValue::new("false")],
            AttributeKind::Enum { values } => values.clone(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AttributeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, rename = "defaultValue", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
    /// Extra attributes unlocked by a particular value of this attribute,
    /// e.g. `picker mode="region"`.
    #[serde(default, rename = "subAttrs", skip_serializing_if = "Vec::is_empty")]
    pub sub_attrs: Vec<SubAttributes>,
}

impl AttributeSpec {
    fn new(name: &str, kind: AttributeKind, desc: &str) -> Self {
        AttributeSpec {
            name: name.to_owned(),
            kind,
            desc: Some(desc.to_owned()),
            default_value: None,
            since: None,
            sub_attrs: Vec::new(),
        }
    }

    /// Whether the declared default counts as "no default". The component
    /// docs write `无` ("none") or `false` for attributes without one.
    pub fn has_default(&self) -> bool {
        self.default_value
            .as_deref()
            .is_some_and(|d| !d.is_empty() && d != "无" && d != "false")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAttributes {
    pub equal: String,
    pub attrs: Vec<AttributeSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, rename = "docLink", skip_serializing_if = "Option::is_none")]
    pub doc_link: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tips: Vec<String>,
    #[serde(default)]
    pub attrs: Vec<AttributeSpec>,
}

impl TagSpec {
    /// The attribute whose value selects extra attributes, if any.
    pub fn mode_attribute(&self) -> Option<&AttributeSpec> {
        self.attrs.iter().find(|a| !a.sub_attrs.is_empty())
    }

    /// Attributes unlocked by `mode`.
    pub fn mode_attributes(&self, mode: &str) -> &[AttributeSpec] {
        self.mode_attribute()
            .and_then(|a| a.sub_attrs.iter().find(|s| s.equal == mode))
            .map_or(&[], |s| s.attrs.as_slice())
    }
}

/// Source of tag, attribute and value knowledge.
pub trait SchemaProvider: Send + Sync {
    fn tags(&self) -> &[TagSpec];

    fn tag(&self, name: &str) -> Option<&TagSpec> {
        self.tags().iter().find(|t| t.name == name)
    }

    /// Attributes declared for `tag`, followed by those unlocked by `mode`.
    fn attributes(&self, tag: &str, mode: Option<&str>) -> Vec<&AttributeSpec> {
        let Some(spec) = self.tag(tag) else {
            return Vec::new();
        };
        let extra = mode.map_or(&[][..], |m| spec.mode_attributes(m));
        spec.attrs.iter().chain(extra).collect()
    }

    fn values(&self, tag: &str, attribute: &str, mode: Option<&str>) -> Vec<EnumValue> {
        self.attributes(tag, mode)
            .into_iter()
            .find(|a| a.name == attribute)
            .map(|a| a.kind.values())
            .unwrap_or_default()
    }
}

/// Attributes every element accepts, in order: globals, events, control
/// directives, list directives.
pub fn language_attributes() -> &'static [AttributeSpec] {
    static ATTRIBUTES: OnceLock<Vec<AttributeSpec>> = OnceLock::new();
    ATTRIBUTES.get_or_init(build_language_attributes)
}

const EVENTS: &[(&str, &str)] = &[
    ("touchstart", "手指触摸动作开始"),
    ("touchmove", "手指触摸后移动"),
    ("touchcancel", "手指触摸动作被打断，如来电提醒，弹窗"),
    ("touchend", "手指触摸动作结束"),
    ("tap", "手指触摸后马上离开"),
    ("longpress", "手指触摸后，超过350ms再离开"),
    ("longtap", "手指触摸后，超过350ms再离开（推荐使用 longpress）"),
    ("transitionend", "会在 WXSS transition 或 wx.createAnimation 动画结束后触发"),
    ("animationstart", "会在一个 WXSS animation 动画开始时触发"),
    ("animationiteration", "会在一个 WXSS animation 一次迭代结束时触发"),
    ("animationend", "会在一个 WXSS animation 动画完成时触发"),
    ("touchforcechange", "在支持 3D Touch 的 iPhone 设备，重按时会触发"),
];

fn build_language_attributes() -> Vec<AttributeSpec> {
    let mut out = vec![
        AttributeSpec::new("id", AttributeKind::String, "组件的唯一标示"),
        AttributeSpec::new("class", AttributeKind::String, "组件的样式类"),
        AttributeSpec::new("style", AttributeKind::String, "组件的内联样式"),
        AttributeSpec::new("hidden", AttributeKind::Boolean, "组件是否显示"),
    ];
    for prefix in ["bind:", "catch:", "bind", "catch"] {
        for (event, desc) in EVENTS {
            out.push(AttributeSpec::new(
                &format!("{prefix}{event}"),
                AttributeKind::Event,
                desc,
            ));
        }
    }
    out.extend([
        AttributeSpec::new("wx:if", AttributeKind::Boolean, "根据条件决定是否渲染该节点"),
        AttributeSpec::new("wx:elif", AttributeKind::Boolean, "前一个 wx:if 不成立时判断的条件"),
        AttributeSpec::new("wx:else", AttributeKind::Logic, "前面的条件都不成立时渲染该节点"),
        AttributeSpec::new("wx:key", AttributeKind::Logic, "列表项的唯一标识"),
    ]);
    out.extend([
        AttributeSpec::new("wx:for", AttributeKind::Iterate, "绑定一个数组，使用数组中各项重复渲染该组件"),
        AttributeSpec::new("wx:for-items", AttributeKind::Iterate, "wx:for 的旧写法"),
        AttributeSpec::new("wx:for-index", AttributeKind::Logic, "数组当前项下标的变量名，默认为 index"),
        AttributeSpec::new("wx:for-item", AttributeKind::Logic, "数组当前项的变量名，默认为 item"),
        AttributeSpec::new("wx:item", AttributeKind::Logic, "wx:for-item 的简写"),
        AttributeSpec::new("wx:index", AttributeKind::Logic, "wx:for-index 的简写"),
    ]);
    out
}

/// Everything `tag` accepts: its own attributes (including those selected
/// by `mode`) followed by the language attributes. The first declaration of
/// a name wins.
pub fn attributes_for<'a>(
    schema: &'a dyn SchemaProvider,
    tag: &str,
    mode: Option<&str>,
) -> Vec<&'a AttributeSpec> {
    let mut seen = HashSet::new();
    schema
        .attributes(tag, mode)
        .into_iter()
        .chain(language_attributes())
        .filter(|a| seen.insert(a.name.as_str()))
        .collect()
}

pub fn find_attribute<'a>(
    schema: &'a dyn SchemaProvider,
    tag: &str,
    name: &str,
    mode: Option<&str>,
) -> Option<&'a AttributeSpec> {
    schema
        .attributes(tag, mode)
        .into_iter()
        .chain(language_attributes())
        .find(|a| a.name == name)
}

/// Completion values for `attribute` on `tag`.
pub fn values_for(
    schema: &dyn SchemaProvider,
    tag: &str,
    attribute: &str,
    mode: Option<&str>,
) -> Vec<EnumValue> {
    let own = schema.values(tag, attribute, mode);
    if !own.is_empty() {
        return own;
    }
    find_attribute(schema, tag, attribute, mode)
        .map(|a| a.kind.values())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TinySchema(Vec<TagSpec>);

    impl SchemaProvider for TinySchema {
        fn tags(&self) -> &[TagSpec] {
            &self.0
        }
    }

    fn tiny() -> TinySchema {
        let json = r#"[{
            "name": "picker",
            "attrs": [
                {"name": "mode", "type": {"name": "enum", "values": [{"value": "selector"}, {"value": "region"}]},
                 "subAttrs": [{"equal": "region", "attrs": [{"name": "custom-item", "type": {"name": "string"}}]}]},
                {"name": "id", "type": {"name": "number"}}
            ]
        }]"#;
        TinySchema(serde_json::from_str(json).expect("fixture parses"))
    }

    #[test]
    fn language_attributes_are_unique() {
        let mut seen = HashSet::new();
        for attr in language_attributes() {
            assert!(seen.insert(&attr.name), "duplicate {}", attr.name);
        }
        assert!(seen.contains(&"bind:tap".to_owned()));
        assert!(seen.contains(&"wx:for-items".to_owned()));
    }

    #[test]
    fn mode_unlocks_sub_attributes() {
        let schema = tiny();
        let names = |mode| -> Vec<String> {
            schema
                .attributes("picker", mode)
                .into_iter()
                .map(|a| a.name.clone())
                .collect()
        };
        assert_eq!(names(None), vec!["mode", "id"]);
        assert_eq!(names(Some("region")), vec!["mode", "id", "custom-item"]);
        assert_eq!(names(Some("selector")), vec!["mode", "id"]);
    }

    #[test]
    fn tag_declaration_shadows_language_attribute() {
        let schema = tiny();
        let merged = attributes_for(&schema, "picker", None);
        let ids: Vec<_> = merged.iter().filter(|a| a.name == "id").collect();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].kind, AttributeKind::Number);
        assert!(merged.iter().any(|a| a.name == "wx:if"));
    }

    #[test]
    fn values_fall_back_to_language_attributes() {
        let schema = tiny();
        let values: Vec<String> = values_for(&schema, "picker", "hidden", None)
            .into_iter()
            .map(|v| v.value)
            .collect();
        assert_eq!(values, vec!["true", "false"]);
        assert_eq!(values_for(&schema, "picker", "mode", None).len(), 2);
        assert!(values_for(&schema, "unknown", "class", None).is_empty());
    }

    #[test]
    fn placeholder_defaults_do_not_count() {
        let mut attr = AttributeSpec::new("space", AttributeKind::String, "");
        assert!(!attr.has_default());
        attr.default_value = Some("无".into());
        assert!(!attr.has_default());
        attr.default_value = Some("false".into());
        assert!(!attr.has_default());
        attr.default_value = Some("scaleToFill".into());
        assert!(attr.has_default());
    }
}

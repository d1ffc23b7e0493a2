use std::sync::OnceLock;

use super::{AttributeKind, AttributeSpec, SchemaProvider, TagSpec};

static COMPONENTS_JSON: &str = include_str!("../../data/components.json");

/// The component table shipped with the crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinSchema {
    tags: Vec<TagSpec>,
}

impl BuiltinSchema {
    pub fn load() -> Result<Self, serde_json::Error> {
        Self::from_json(COMPONENTS_JSON)
    }

    /// Build a schema from a JSON array of tag descriptions in the same
    /// shape as the bundled table. `<wxs>` is appended when missing.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut tags: Vec<TagSpec> = serde_json::from_str(json)?;
        if !tags.iter().any(|t| t.name == "wxs") {
            tags.push(wxs_tag());
        }
        Ok(BuiltinSchema { tags })
    }

    /// Process-wide instance of the bundled table.
    pub fn shared() -> &'static BuiltinSchema {
        static SCHEMA: OnceLock<BuiltinSchema> = OnceLock::new();
        SCHEMA.get_or_init(|| Self::load().expect("bundled components.json must parse"))
    }
}

impl SchemaProvider for BuiltinSchema {
    fn tags(&self) -> &[TagSpec] {
        &self.tags
    }
}

fn wxs_tag() -> TagSpec {
    TagSpec {
        name: "wxs".to_owned(),
        desc: Some("WXS（WeiXin Script）是小程序的一套脚本语言，结合 WXML，可以构建出页面的结构".to_owned()),
        doc_link: Some("https://developers.weixin.qq.com/miniprogram/dev/reference/wxs/".to_owned()),
        tips: Vec::new(),
        attrs: vec![
            AttributeSpec::new("module", AttributeKind::String, "当前 <wxs> 标签的模块名。必填字段"),
            AttributeSpec::new("src", AttributeKind::String, "引用 .wxs 文件的相对路径。仅当本标签为单闭合标签或标签的内容为空时有效"),
        ],
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn bundled_table_loads() {
        let schema = BuiltinSchema::load().expect("bundled table parses");
        assert!(schema.tag("view").is_some());
        assert!(schema.tag("wxs").is_some());
        assert!(schema.tags().len() > 20);
    }

    #[test]
    fn tag_names_are_unique() {
        let schema = BuiltinSchema::shared();
        let mut seen = HashSet::new();
        for tag in schema.tags() {
            assert!(seen.insert(tag.name.as_str()), "duplicate tag {}", tag.name);
            let mut attrs = HashSet::new();
            for attr in &tag.attrs {
                assert!(attrs.insert(attr.name.as_str()), "duplicate {}.{}", tag.name, attr.name);
            }
        }
    }

    #[test]
    fn from_json_appends_wxs() {
        let schema = BuiltinSchema::from_json(r#"[{"name": "view"}]"#).expect("parses");
        let names: Vec<&str> = schema.tags().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["view", "wxs"]);
    }

    #[test]
    fn picker_region_mode() {
        let schema = BuiltinSchema::shared();
        let attrs = schema.attributes("picker", Some("region"));
        assert!(attrs.iter().any(|a| a.name == "custom-item"));
        let attrs = schema.attributes("picker", Some("selector"));
        assert!(!attrs.iter().any(|a| a.name == "custom-item"));
    }
}

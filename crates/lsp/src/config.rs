//! Client-supplied settings.
//!
//! Settings arrive as `initializationOptions` and through
//! `workspace/didChangeConfiguration`, either wrapped in a `wxml` section or
//! as the bare object:
//!
//! ```json
//! { "wxml": { "complete": { "useSnippet": true, "completeEvent": false }, "docsDir": "/opt/wxml-docs" } }
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ServiceError;

/// What the completion engine may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionConfig {
    /// Emit snippets (`name="$1"`, `$0</tag>`) instead of plain text.
    pub use_snippet: bool,
    /// Offer `bind*` / `catch*` event attributes.
    pub complete_event: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        CompletionConfig {
            use_snippet: false,
            complete_event: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub complete: CompleteSettings,
    /// Directory of markdown files used for hover, laid out as
    /// `<tag>.md` and `<tag>/<attribute>.md`.
    pub docs_dir: Option<PathBuf>,
}

/// Unset fields fall back to what the client advertises.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompleteSettings {
    pub use_snippet: Option<bool>,
    pub complete_event: Option<bool>,
}

impl Settings {
    pub fn from_value(value: &Value) -> Result<Self, ServiceError> {
        let section = value.get("wxml").unwrap_or(value);
        if section.is_null() {
            return Ok(Settings::default());
        }
        Ok(serde_json::from_value(section.clone())?)
    }

    pub fn completion(&self, snippet_support: bool) -> CompletionConfig {
        CompletionConfig {
            use_snippet: self.complete.use_snippet.unwrap_or(snippet_support),
            complete_event: self.complete.complete_event.unwrap_or(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn wrapped_and_bare_sections() {
        let wrapped = Settings::from_value(&json!({
            "wxml": { "complete": { "completeEvent": false } },
            "editor": { "tabSize": 2 }
        }))
        .unwrap();
        assert_eq!(wrapped.complete.complete_event, Some(false));

        let bare = Settings::from_value(&json!({ "docsDir": "/tmp/docs" })).unwrap();
        assert_eq!(bare.docs_dir, Some(PathBuf::from("/tmp/docs")));
        assert_eq!(bare.complete, CompleteSettings::default());

        assert_eq!(Settings::from_value(&Value::Null).unwrap(), Settings::default());
    }

    #[test]
    fn malformed_settings_are_rejected() {
        let err = Settings::from_value(&json!({ "complete": { "useSnippet": "yes" } })).unwrap_err();
        assert!(matches!(err, ServiceError::Settings(_)));
    }

    #[test]
    fn snippet_support_is_the_fallback() {
        let settings = Settings::default();
        assert_eq!(
            settings.completion(true),
            CompletionConfig { use_snippet: true, complete_event: true }
        );
        let settings = Settings::from_value(&json!({ "complete": { "useSnippet": false } })).unwrap();
        assert!(!settings.completion(true).use_snippet);
    }
}

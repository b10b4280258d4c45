//! Auth file records as reported by the management API
//!
//! The upstream service owns this format and changes it between releases, so
//! decoding is deliberately forgiving: every field except `name` is optional,
//! `null` is accepted everywhere, unknown fields are ignored, and a single
//! malformed entry never poisons the rest of the listing.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// One credential ("auth file") in the upstream pool.
///
/// `name` is the only stable key across polls. Everything else is advisory and
/// may be missing or reshaped by a newer upstream version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthFile {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Older upstream versions report the provider under `type`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<bool>,
}

impl AuthFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.status_message = Some(message.into());
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    pub fn with_unavailable(mut self, unavailable: bool) -> Self {
        self.unavailable = Some(unavailable);
        self
    }

    /// Provider classification: `provider`, falling back to `type`.
    pub fn provider_label(&self) -> &str {
        self.provider
            .as_deref()
            .filter(|p| !p.is_empty())
            .or(self.kind.as_deref())
            .unwrap_or("")
    }

    /// Status code, or `""` when absent.
    pub fn status_code(&self) -> &str {
        self.status.as_deref().unwrap_or("")
    }

    /// Human-oriented status message, or `""` when absent.
    pub fn message(&self) -> &str {
        self.status_message.as_deref().unwrap_or("")
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.unwrap_or(false)
    }

    pub fn is_unavailable(&self) -> bool {
        self.unavailable.unwrap_or(false)
    }
}

/// Decode the body of `GET /auth-files`.
///
/// Accepts the documented `{"files": [...]}` wrapper as well as a bare array.
/// Entries that fail to decode are logged and dropped; any other shape yields
/// an empty listing.
pub fn parse_auth_files(body: serde_json::Value) -> Vec<AuthFile> {
    let entries = match body {
        serde_json::Value::Object(mut map) => match map.remove("files") {
            Some(serde_json::Value::Array(entries)) => entries,
            _ => return Vec::new(),
        },
        serde_json::Value::Array(entries) => entries,
        _ => return Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<AuthFile>(entry) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(error = %e, "skipping undecodable auth file entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_files_wrapper() {
        let body = json!({
            "files": [
                {"name": "claude-a.json", "provider": "claude", "status": "active",
                 "status_message": "Quota: 45% remaining", "disabled": false, "unavailable": false},
                {"name": "gemini-b.json", "type": "gemini"}
            ]
        });
        let files = parse_auth_files(body);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "claude-a.json");
        assert_eq!(files[0].message(), "Quota: 45% remaining");
        assert_eq!(files[1].provider_label(), "gemini");
        assert!(!files[1].is_disabled());
    }

    #[test]
    fn parses_bare_array() {
        let files = parse_auth_files(json!([{"name": "a"}, {"name": "b"}]));
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn tolerates_nulls_and_unknown_fields() {
        let files = parse_auth_files(json!({
            "files": [{
                "name": "a",
                "provider": null,
                "status_message": null,
                "disabled": null,
                "last_refresh": "2026-01-01T00:00:00Z"
            }]
        }));
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].message(), "");
        assert_eq!(files[0].provider_label(), "");
        assert!(!files[0].is_disabled());
    }

    #[test]
    fn malformed_entry_is_dropped_not_fatal() {
        let files = parse_auth_files(json!([
            {"name": "good"},
            {"name": "bad", "disabled": "yes"},
            "not an object"
        ]));
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "good");
    }

    #[test]
    fn unexpected_shapes_yield_empty_listing() {
        assert!(parse_auth_files(json!({"items": []})).is_empty());
        assert!(parse_auth_files(json!({"files": "nope"})).is_empty());
        assert!(parse_auth_files(json!("files")).is_empty());
        assert!(parse_auth_files(serde_json::Value::Null).is_empty());
    }

    #[test]
    fn provider_falls_back_to_type() {
        let mut file = AuthFile::new("x");
        file.kind = Some("codex".into());
        assert_eq!(file.provider_label(), "codex");

        let file = file.with_provider("openai");
        assert_eq!(file.provider_label(), "openai");
    }
}

//! Provider allow-list
//!
//! Restricts automated action to a subset of credentials. Records outside the
//! filter are still polled and logged, they are just never acted upon.

use cpa_management::AuthFile;

/// Case-insensitive substring filter over a record's name and provider.
/// An empty filter lets everything through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderFilter {
    tokens: Vec<String>,
}

impl ProviderFilter {
    /// Build a filter from raw tokens. Tokens are trimmed and lowercased; blank
    /// tokens are dropped so `"claude, "` behaves like `"claude"`.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens = tokens
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn matches(&self, record: &AuthFile) -> bool {
        if self.tokens.is_empty() {
            return true;
        }
        let name = record.name.to_lowercase();
        let provider = record.provider.as_deref().unwrap_or("").to_lowercase();
        let kind = record.kind.as_deref().unwrap_or("").to_lowercase();
        self.tokens
            .iter()
            .any(|t| name.contains(t) || provider.contains(t) || kind.contains(t))
    }
}

/// Whether `record` is in scope for `filters`.
pub fn matches<S: AsRef<str>>(record: &AuthFile, filters: &[S]) -> bool {
    ProviderFilter::new(filters).matches(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<AuthFile> {
        vec![
            AuthFile::new("claude-max-1.json").with_provider("claude"),
            AuthFile::new("gemini-user@example.com.json").with_provider("gemini"),
            AuthFile::new("account-7.json").with_provider("Codex"),
        ]
    }

    #[test]
    fn empty_filter_matches_everything() {
        let empty: [&str; 0] = [];
        for record in records() {
            assert!(matches(&record, &empty), "{} should pass", record.name);
        }
        assert!(ProviderFilter::new([" ", ""]).is_empty());
    }

    #[test]
    fn matches_on_name_substring() {
        let filter = ProviderFilter::new(["MAX"]);
        let hits: Vec<_> = records()
            .into_iter()
            .filter(|r| filter.matches(r))
            .map(|r| r.name)
            .collect();
        assert_eq!(hits, vec!["claude-max-1.json"]);
    }

    #[test]
    fn matches_on_provider_case_insensitively() {
        let filter = ProviderFilter::new(["codex"]);
        let hits: Vec<_> = records()
            .into_iter()
            .filter(|r| filter.matches(r))
            .map(|r| r.name)
            .collect();
        assert_eq!(hits, vec!["account-7.json"]);
    }

    #[test]
    fn matches_on_type_field() {
        let mut record = AuthFile::new("x.json");
        record.kind = Some("Qwen".into());
        assert!(matches(&record, &["qwen"]));
    }

    #[test]
    fn excludes_records_matching_no_token() {
        let filter = ProviderFilter::new(["claude", "gemini"]);
        assert!(!filter.matches(&records()[2]));
        assert_eq!(filter.tokens(), ["claude", "gemini"]);
    }
}

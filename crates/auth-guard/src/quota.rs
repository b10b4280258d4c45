//! Quota signal extraction from auth file records
//!
//! The upstream service does not expose quota as a number. It writes free text
//! into `status_message` ("Quota: 45% remaining", "85% used", ...) and a status
//! code into `status`, and neither format is a contract. Extraction therefore
//! never fails: anything that cannot be read resolves to `Verdict::Unknown`
//! (percent mode) or "not exhausted" (keyword mode).

use std::sync::LazyLock;

use cpa_management::AuthFile;
use regex::Regex;

/// How a matched number maps onto "percent remaining".
#[derive(Debug, Clone, Copy)]
enum Reading {
    Remaining,
    Used,
}

struct Rule {
    pattern: Regex,
    reading: Reading,
}

/// Ordered extraction rules. The first rule that matches wins; the bare `N%`
/// rule is an ambiguous last resort and is read as "remaining".
static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    [
        (r"(?i)(\d+(?:\.\d+)?)\s*%\s*remaining", Reading::Remaining),
        (r"(?i)(\d+(?:\.\d+)?)\s*%\s*used", Reading::Used),
        (r"(?i)quota_remaining\s*:\s*(\d+(?:\.\d+)?)", Reading::Remaining),
        (r"(?i)remaining\s*:\s*(\d+(?:\.\d+)?)\s*%?", Reading::Remaining),
        (r"(\d+(?:\.\d+)?)\s*%", Reading::Remaining),
    ]
    .into_iter()
    .map(|(pattern, reading)| Rule {
        pattern: Regex::new(pattern).expect("quota pattern is valid"),
        reading,
    })
    .collect()
});

static REMAINING_PERCENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*%\s*remaining").expect("remaining pattern is valid")
});

static USED_PERCENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*%\s*used").expect("used pattern is valid")
});

/// Status codes that mean "no quota left" when the message carries no number.
const EXHAUSTED_STATUSES: &[&str] = &["exhausted", "rate_limited", "quota_exceeded"];

/// Phrases that mark a credential as exhausted in keyword mode. Matched
/// case-insensitively against both `status` and `status_message`.
const EXHAUSTION_KEYWORDS: &[&str] = &[
    "exhausted",
    "rate_limit",
    "rate limit",
    "quota_exceeded",
    "quota exceeded",
    "out of credits",
    "limit reached",
    "capacity",
];

fn first_number(pattern: &Regex, text: &str) -> Option<f64> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Best-effort percent of quota remaining, always within `[0, 100]`.
///
/// Returns `None` when neither the message nor the status says anything
/// usable. Callers must treat `None` as "skip", never as healthy.
pub fn remaining_percent(record: &AuthFile) -> Option<f64> {
    let message = record.message();

    for rule in RULES.iter() {
        if let Some(value) = first_number(&rule.pattern, message) {
            let remaining = match rule.reading {
                Reading::Remaining => value,
                Reading::Used => 100.0 - value,
            };
            return Some(remaining.clamp(0.0, 100.0));
        }
    }

    let status = record.status_code().trim().to_lowercase();
    if EXHAUSTED_STATUSES.contains(&status.as_str()) {
        return Some(0.0);
    }

    None
}

/// Keyword-mode check. Absence of any signal means healthy.
pub fn is_exhausted(record: &AuthFile) -> bool {
    if record.is_unavailable() {
        return true;
    }

    let status = record.status_code().to_lowercase();
    let message = record.message().to_lowercase();
    if EXHAUSTION_KEYWORDS
        .iter()
        .any(|kw| status.contains(kw) || message.contains(kw))
    {
        return true;
    }

    if first_number(&REMAINING_PERCENT, &message).is_some_and(|n| n == 0.0) {
        return true;
    }

    first_number(&USED_PERCENT, &message).is_some_and(|n| n >= 100.0)
}

/// Outcome of inspecting one record. Recomputed every cycle, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Exhausted { remaining: Option<f64> },
    Healthy { remaining: Option<f64> },
    Unknown,
}

impl Verdict {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Verdict::Exhausted { .. })
    }

    pub fn remaining(&self) -> Option<f64> {
        match self {
            Verdict::Exhausted { remaining } | Verdict::Healthy { remaining } => *remaining,
            Verdict::Unknown => None,
        }
    }
}

/// Extraction strategy, chosen per deployment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Detection {
    /// Numeric estimate; exhausted when remaining drops below `threshold` percent.
    Percent { threshold: f64 },
    /// Boolean keyword heuristic, no unknown state.
    Keyword,
}

impl Detection {
    pub fn evaluate(&self, record: &AuthFile) -> Verdict {
        match self {
            Detection::Percent { threshold } => match remaining_percent(record) {
                Some(remaining) if remaining < *threshold => Verdict::Exhausted {
                    remaining: Some(remaining),
                },
                Some(remaining) => Verdict::Healthy {
                    remaining: Some(remaining),
                },
                None => Verdict::Unknown,
            },
            Detection::Keyword => {
                if is_exhausted(record) {
                    Verdict::Exhausted { remaining: None }
                } else {
                    Verdict::Healthy { remaining: None }
                }
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Detection::Percent { .. } => "percent",
            Detection::Keyword => "keyword",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(message: &str) -> AuthFile {
        AuthFile::new("acct.json").with_message(message)
    }

    #[test]
    fn percent_remaining() {
        assert_eq!(remaining_percent(&msg("Quota: 45% remaining")), Some(45.0));
    }

    #[test]
    fn percent_used_is_inverted() {
        assert_eq!(remaining_percent(&msg("85% used")), Some(15.0));
    }

    #[test]
    fn quota_remaining_field() {
        assert_eq!(remaining_percent(&msg("quota_remaining: 30")), Some(30.0));
    }

    #[test]
    fn remaining_colon_form() {
        assert_eq!(remaining_percent(&msg("remaining: 10%")), Some(10.0));
        assert_eq!(remaining_percent(&msg("Remaining:7")), Some(7.0));
    }

    #[test]
    fn bare_percent_fallback() {
        assert_eq!(remaining_percent(&msg("random text 12%")), Some(12.0));
    }

    #[test]
    fn exhausted_status_without_numbers_is_zero() {
        let record = AuthFile::new("a").with_status("exhausted");
        assert_eq!(remaining_percent(&record), Some(0.0));

        let record = AuthFile::new("a")
            .with_status("Rate_Limited")
            .with_message("try later");
        assert_eq!(remaining_percent(&record), Some(0.0));
    }

    #[test]
    fn nothing_recognisable_is_unknown() {
        let record = AuthFile::new("a")
            .with_status("active")
            .with_message("all good");
        assert_eq!(remaining_percent(&record), None);
        assert_eq!(remaining_percent(&AuthFile::new("a")), None);
    }

    #[test]
    fn earlier_rules_take_priority() {
        // "used" would give 80, "remaining" wins because it is checked first
        assert_eq!(
            remaining_percent(&msg("20% used, 75% remaining")),
            Some(75.0)
        );
        // quota_remaining is checked before the generic remaining rule
        assert_eq!(
            remaining_percent(&msg("QUOTA_REMAINING : 33.5")),
            Some(33.5)
        );
    }

    #[test]
    fn numbers_beat_exhausted_status() {
        let record = AuthFile::new("a")
            .with_status("exhausted")
            .with_message("50% remaining");
        assert_eq!(remaining_percent(&record), Some(50.0));
    }

    #[test]
    fn decimals_case_and_punctuation() {
        assert_eq!(
            remaining_percent(&msg("[Quota]:12.5%REMAINING!")),
            Some(12.5)
        );
        let used = remaining_percent(&msg("(99.9 % Used)")).unwrap();
        assert!((used - 0.1).abs() < 1e-9, "got {used}");
    }

    #[test]
    fn result_is_always_within_bounds() {
        let samples = [
            "150% used",
            "250% remaining",
            "quota_remaining: 1000",
            "remaining: 0",
            "0% used",
            "-5% remaining",
            "99999999999999999999999999% used",
            "%%%",
            "",
            "100%",
        ];
        for sample in samples {
            if let Some(value) = remaining_percent(&msg(sample)) {
                assert!(
                    (0.0..=100.0).contains(&value),
                    "{sample:?} produced {value}"
                );
            }
        }
        assert_eq!(remaining_percent(&msg("150% used")), Some(0.0));
        assert_eq!(remaining_percent(&msg("250% remaining")), Some(100.0));
    }

    #[test]
    fn keyword_unavailable_wins() {
        let record = AuthFile::new("a")
            .with_status("active")
            .with_message("90% remaining")
            .with_unavailable(true);
        assert!(is_exhausted(&record));
    }

    #[test]
    fn keyword_zero_remaining() {
        assert!(is_exhausted(&msg("0% remaining")));
        assert!(is_exhausted(&msg("0.0 % remaining")));
    }

    #[test]
    fn keyword_fully_used() {
        assert!(is_exhausted(&msg("100% used")));
        assert!(is_exhausted(&msg("120% used")));
        assert!(!is_exhausted(&msg("99% used")));
    }

    #[test]
    fn keyword_partial_remaining_is_healthy() {
        assert!(!is_exhausted(&msg("50% remaining")));
        assert!(!is_exhausted(&AuthFile::new("a")));
    }

    #[test]
    fn keyword_vocabulary_in_status_or_message() {
        assert!(is_exhausted(&AuthFile::new("a").with_status("RATE_LIMITED")));
        assert!(is_exhausted(&msg("Daily limit reached")));
        assert!(is_exhausted(&msg("Model at capacity, retry later")));
        assert!(is_exhausted(&msg("Account is out of credits")));
        assert!(is_exhausted(&AuthFile::new("a").with_status("quota exceeded")));
        assert!(!is_exhausted(&AuthFile::new("a").with_status("active")));
    }

    #[test]
    fn percent_detection_applies_threshold() {
        let detection = Detection::Percent { threshold: 10.0 };
        assert_eq!(
            detection.evaluate(&msg("5% remaining")),
            Verdict::Exhausted {
                remaining: Some(5.0)
            }
        );
        assert_eq!(
            detection.evaluate(&msg("10% remaining")),
            Verdict::Healthy {
                remaining: Some(10.0)
            }
        );
        assert_eq!(detection.evaluate(&msg("nothing here")), Verdict::Unknown);
    }

    #[test]
    fn keyword_detection_never_unknown() {
        let detection = Detection::Keyword;
        assert_eq!(
            detection.evaluate(&msg("nothing here")),
            Verdict::Healthy { remaining: None }
        );
        assert!(detection.evaluate(&msg("exhausted")).is_exhausted());
        assert_eq!(detection.label(), "keyword");
    }
}

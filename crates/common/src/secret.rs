//! Redacting wrapper for credentials such as the management key

use std::fmt;
use zeroize::Zeroize;

/// Sensitive value. Prints as `[REDACTED]` and is wiped from memory on drop.
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the wrapped value. Callers must not log it.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// Build a secret from user input, trimming surrounding whitespace.
    ///
    /// Returns `None` when nothing is left after trimming, so an empty key file
    /// or `CPA_MANAGEMENT_KEY=""` counts as "not configured".
    pub fn from_trimmed(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_and_display_are_redacted() {
        let key = Secret::new(String::from("mgmt-key-123"));
        assert_eq!(format!("{key:?}"), "[REDACTED]");
        assert_eq!(format!("{key}"), "[REDACTED]");
    }

    #[test]
    fn expose_returns_inner_value() {
        let key = Secret::new(String::from("mgmt-key-123"));
        assert_eq!(key.expose(), "mgmt-key-123");
    }

    #[test]
    fn from_trimmed_strips_whitespace() {
        let key = Secret::from_trimmed("  mgmt-key\n").unwrap();
        assert_eq!(key.expose(), "mgmt-key");
    }

    #[test]
    fn from_trimmed_rejects_blank_input() {
        assert!(Secret::from_trimmed("").is_none());
        assert!(Secret::from_trimmed(" \n\t ").is_none());
    }
}

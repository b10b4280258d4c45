//! Names of credentials this guard took offline itself
//!
//! The ledger is what separates "disabled by us" (ours to re-enable) from
//! "disabled externally" (never touched). It is an explicit value owned by the
//! poll task and lent to each cycle, so tests and restarts can seed it.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisabledLedger {
    names: BTreeSet<String>,
}

impl DisabledLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger pre-populated with `names`, e.g. from surviving backups.
    pub fn seeded<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Returns `false` if the name was already present.
    pub fn insert(&mut self, name: &str) -> bool {
        self.names.insert(name.to_owned())
    }

    /// Returns `false` if the name was not present.
    pub fn remove(&mut self, name: &str) -> bool {
        self.names.remove(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

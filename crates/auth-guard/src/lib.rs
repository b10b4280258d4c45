//! Quota guard for a pool of CLIProxyAPI auth files
//!
//! Watches the credential snapshot exposed by the management API, decides which
//! credentials have run out of quota, and takes them offline until they recover.
//! The guard only ever re-enables credentials it disabled itself; anything an
//! operator disabled is left alone.
//!
//! Per cycle:
//! 1. Fetch the snapshot (`ManagementApi::list_auth_files`); a failure skips the cycle
//! 2. Drop records outside the provider filter (`ProviderFilter`)
//! 3. Read a quota verdict from each record (`Detection`)
//! 4. Plan a transition from state + verdict (`plan`) and execute it
//! 5. Record what this guard disabled in the `DisabledLedger`
//!
//! Two deployment strategies exist. `Strategy::Toggle` flips the upstream
//! `disabled` flag. `Strategy::Delete` removes the credential upstream after
//! saving its content to a `BackupStore`, and re-uploads it on recovery.

pub mod api;
pub mod backup;
pub mod error;
pub mod filter;
pub mod ledger;
pub mod lifecycle;
pub mod poll;
pub mod quota;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ManagementApi, Notifier, RemoteFuture, Severity};
pub use backup::{BackupStore, FileBackupStore};
pub use error::{Error, Result};
pub use filter::{ProviderFilter, matches};
pub use ledger::DisabledLedger;
pub use lifecycle::{
    AccountState, Action, CycleReport, Lifecycle, Settings, Strategy, StrategyKind, plan,
};
pub use poll::spawn_poll_task;
pub use quota::{Detection, Verdict, is_exhausted, remaining_percent};

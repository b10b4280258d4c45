//! Account lifecycle state machine
//!
//! Each credential is, from this guard's point of view, `Enabled`,
//! `DisabledByUs` (in the ledger) or `DisabledExternally` (upstream says
//! disabled, ledger does not know it). `plan` is a pure function from state and
//! quota verdict to an `Action`; `Lifecycle::run_cycle` performs the I/O each
//! action implies and keeps the ledger in step.
//!
//! Transitions:
//! - Enabled → DisabledByUs: verdict exhausted. Delete strategy saves a backup
//!   first and aborts if that fails.
//! - DisabledByUs → Enabled (toggle): latest record no longer exhausted.
//! - DisabledByUs → Enabled (delete): re-uploaded from backup every cycle while
//!   absent upstream; the next poll decides whether it goes down again.
//! - DisabledByUs → Enabled (delete, adopt): listed upstream again and healthy,
//!   so someone else restored it; ownership is released.
//! - DisabledByUs, delete strategy, listed upstream and exhausted: the delete
//!   never happened, so the credential is disabled again (backup overwritten).
//! - DisabledExternally: never touched.
//!
//! Every failure leaves the credential's state as it was, to be retried on the
//! next cycle. One credential's failure never stops evaluation of the others.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use cpa_management::AuthFile;
use serde::Serialize;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::api::{ManagementApi, Notifier, Severity};
use crate::backup::BackupStore;
use crate::filter::ProviderFilter;
use crate::ledger::DisabledLedger;
use crate::quota::{Detection, Verdict};

/// Prefix on notification titles for actions that were not applied.
pub const DRY_RUN_PREFIX: &str = "DRY RUN: ";

/// How credentials are taken offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Delete,
    Toggle,
}

impl StrategyKind {
    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::Delete => "delete",
            StrategyKind::Toggle => "toggle",
        }
    }
}

/// Disable mechanism plus whatever it needs. Deleting is only possible with
/// somewhere to keep the content.
#[derive(Clone)]
pub enum Strategy {
    Delete { backups: Arc<dyn BackupStore> },
    Toggle,
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Delete { .. } => StrategyKind::Delete,
            Strategy::Toggle => StrategyKind::Toggle,
        }
    }
}

/// A credential's state as seen by this guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    Enabled,
    DisabledByUs,
    DisabledExternally,
}

impl AccountState {
    /// The ledger wins over the upstream flag: a credential we disabled stays
    /// ours even if upstream has not caught up yet.
    pub fn of(record: &AuthFile, ledger: &DisabledLedger) -> Self {
        if ledger.contains(&record.name) {
            AccountState::DisabledByUs
        } else if record.is_disabled() {
            AccountState::DisabledExternally
        } else {
            AccountState::Enabled
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AccountState::Enabled => "enabled",
            AccountState::DisabledByUs => "disabled_by_us",
            AccountState::DisabledExternally => "disabled_externally",
        }
    }
}

/// What to do with one credential this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Take it offline (backup + delete, or flag).
    Disable,
    /// Flip the flag back (toggle strategy).
    Reenable,
    /// It reappeared upstream healthy; stop tracking it (delete strategy).
    Adopt,
    /// Nothing to do.
    Hold,
    /// Quota could not be read; leave it for the next cycle.
    Skip,
}

/// Pure transition planning for a credential present in the snapshot.
pub fn plan(state: AccountState, verdict: &Verdict, kind: StrategyKind) -> Action {
    match (state, verdict) {
        (AccountState::DisabledExternally, _) => Action::Hold,
        (_, Verdict::Unknown) => Action::Skip,
        (AccountState::Enabled, Verdict::Exhausted { .. }) => Action::Disable,
        (AccountState::Enabled, Verdict::Healthy { .. }) => Action::Hold,
        // A deleted credential is absent upstream. Listed means the delete
        // never landed (e.g. a backup left behind by a failed delete before a
        // restart), so it is still live and must go down.
        (AccountState::DisabledByUs, Verdict::Exhausted { .. }) => match kind {
            StrategyKind::Toggle => Action::Hold,
            StrategyKind::Delete => Action::Disable,
        },
        (AccountState::DisabledByUs, Verdict::Healthy { .. }) => match kind {
            StrategyKind::Toggle => Action::Reenable,
            StrategyKind::Delete => Action::Adopt,
        },
    }
}

/// Policy knobs that do not depend on the strategy.
#[derive(Debug, Clone)]
pub struct Settings {
    pub detection: Detection,
    pub filter: ProviderFilter,
    /// Log and notify every transition, but issue no mutating call upstream.
    pub dry_run: bool,
}

/// Outcome counters for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub polled: usize,
    pub in_scope: usize,
    pub disabled: usize,
    pub reenabled: usize,
    pub adopted: usize,
    pub abandoned: usize,
    pub skipped: usize,
    pub external: usize,
    pub failures: usize,
    pub dry_run_actions: usize,
    pub fetch_failed: bool,
    pub disabled_by_us: usize,
    pub duration_ms: u64,
}

fn record_transition(transition: &'static str, outcome: &'static str) {
    metrics::counter!(
        "guard_transitions_total",
        "transition" => transition,
        "outcome" => outcome
    )
    .increment(1);
}

/// Executes planned transitions against the management API.
pub struct Lifecycle {
    api: Arc<dyn ManagementApi>,
    notifier: Arc<dyn Notifier>,
    strategy: Strategy,
    settings: Settings,
}

impl Lifecycle {
    pub fn new(
        api: Arc<dyn ManagementApi>,
        notifier: Arc<dyn Notifier>,
        strategy: Strategy,
        settings: Settings,
    ) -> Self {
        Self {
            api,
            notifier,
            strategy,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Run one full cycle: fetch, evaluate every credential, act, report.
    ///
    /// Never fails. A snapshot fetch failure ends the cycle early with
    /// `fetch_failed` set; per-credential failures are counted in `failures`.
    pub async fn run_cycle(&self, ledger: &mut DisabledLedger) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("cycle", cycle_id = %cycle_id);
        let started = Instant::now();

        let mut report = self.cycle(ledger).instrument(span).await;

        report.cycle_id = cycle_id;
        report.disabled_by_us = ledger.len();
        report.duration_ms = started.elapsed().as_millis() as u64;

        let outcome = if report.fetch_failed { "fetch_failed" } else { "ok" };
        metrics::counter!("guard_cycles_total", "outcome" => outcome).increment(1);
        metrics::gauge!("guard_disabled_accounts").set(ledger.len() as f64);
        metrics::histogram!("guard_cycle_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        report
    }

    async fn cycle(&self, ledger: &mut DisabledLedger) -> CycleReport {
        let mut report = CycleReport::default();

        let records = match self.api.list_auth_files().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "failed to fetch auth files, skipping cycle");
                report.fetch_failed = true;
                return report;
            }
        };
        report.polled = records.len();
        info!(count = records.len(), "polled auth files");

        let mut seen: HashSet<&str> = HashSet::new();
        for record in &records {
            let name = record.name.as_str();
            if name.is_empty() {
                debug!("skipping auth file without a name");
                continue;
            }
            seen.insert(name);
            self.evaluate(record, ledger, &mut report).await;
        }

        // Owned credentials missing from the snapshot
        let missing: Vec<String> = ledger
            .names()
            .filter(|name| !seen.contains(name))
            .map(str::to_owned)
            .collect();
        for name in missing {
            match &self.strategy {
                Strategy::Delete { backups } => {
                    self.restore(&name, backups.as_ref(), ledger, &mut report)
                        .await
                }
                Strategy::Toggle => {
                    self.abandon(
                        &name,
                        "credential is no longer listed upstream",
                        ledger,
                        &mut report,
                    )
                    .await
                }
            }
        }

        info!(
            in_scope = report.in_scope,
            disabled = report.disabled,
            reenabled = report.reenabled,
            skipped = report.skipped,
            failures = report.failures,
            disabled_by_us = ledger.len(),
            "cycle complete"
        );
        report
    }

    async fn evaluate(
        &self,
        record: &AuthFile,
        ledger: &mut DisabledLedger,
        report: &mut CycleReport,
    ) {
        let name = record.name.as_str();
        let verdict = self.settings.detection.evaluate(record);

        if !self.settings.filter.matches(record) {
            debug!(
                account = name,
                provider = record.provider_label(),
                remaining = ?verdict.remaining(),
                "outside provider filter, not acting"
            );
            return;
        }
        report.in_scope += 1;

        let state = AccountState::of(record, ledger);
        if let Some(remaining) = verdict.remaining() {
            info!(account = name, remaining, state = state.label(), "quota remaining");
        }

        match plan(state, &verdict, self.strategy.kind()) {
            Action::Disable => self.disable(record, &verdict, ledger, report).await,
            Action::Reenable => self.reenable(name, &verdict, ledger, report).await,
            Action::Adopt => self.adopt(name, ledger, report).await,
            Action::Skip => {
                debug!(account = name, "could not determine quota, skipping");
                report.skipped += 1;
            }
            Action::Hold => {
                if state == AccountState::DisabledExternally {
                    debug!(account = name, "disabled externally, leaving alone");
                    report.external += 1;
                }
            }
        }
    }

    async fn disable(
        &self,
        record: &AuthFile,
        verdict: &Verdict,
        ledger: &mut DisabledLedger,
        report: &mut CycleReport,
    ) {
        let name = record.name.as_str();
        let message = self.describe_exhaustion(record, verdict);
        warn!(account = name, remaining = ?verdict.remaining(), "quota exhausted, disabling");

        if self.settings.dry_run {
            self.dry_run("Quota Low", &message, Severity::Warning, report)
                .await;
            return;
        }

        if let Strategy::Delete { backups } = &self.strategy {
            if let Err(e) = self.save_backup(name, backups.as_ref()).await {
                warn!(account = name, error = %e, "backup failed, aborting disable");
                report.failures += 1;
                record_transition("disable", "backup_failed");
                return;
            }
        }

        let result = match &self.strategy {
            Strategy::Delete { .. } => self.api.delete_auth_file(name).await,
            Strategy::Toggle => self.api.set_disabled(name, true).await,
        };
        if let Err(e) = result {
            warn!(account = name, error = %e, "disable failed, will retry next cycle");
            report.failures += 1;
            record_transition("disable", "failed");
            return;
        }

        ledger.insert(name);
        report.disabled += 1;
        record_transition("disable", "ok");
        self.notifier
            .send("Account Disabled", &message, Severity::Warning)
            .await;
    }

    async fn save_backup(&self, name: &str, backups: &dyn BackupStore) -> crate::Result<()> {
        let content = self.api.download_auth_file(name).await?;
        backups.save(name, &content)
    }

    async fn reenable(
        &self,
        name: &str,
        verdict: &Verdict,
        ledger: &mut DisabledLedger,
        report: &mut CycleReport,
    ) {
        let message = match verdict.remaining() {
            Some(remaining) => {
                format!("Account {name} quota back at {remaining:.1}%, re-enabling")
            }
            None => format!("Account {name} no longer reports exhaustion, re-enabling"),
        };
        info!(account = name, "quota recovered, re-enabling");

        if self.settings.dry_run {
            self.dry_run("Account Re-enable", &message, Severity::Info, report)
                .await;
            return;
        }

        if let Err(e) = self.api.set_disabled(name, false).await {
            warn!(account = name, error = %e, "re-enable failed, will retry next cycle");
            report.failures += 1;
            record_transition("reenable", "failed");
            return;
        }

        ledger.remove(name);
        report.reenabled += 1;
        record_transition("reenable", "ok");
        self.notifier
            .send("Account Re-enabled", &message, Severity::Info)
            .await;
    }

    async fn restore(
        &self,
        name: &str,
        backups: &dyn BackupStore,
        ledger: &mut DisabledLedger,
        report: &mut CycleReport,
    ) {
        if !backups.exists(name) {
            self.abandon(name, "no backup available", ledger, report)
                .await;
            return;
        }

        let message = format!("Attempting to re-enable account {name}");
        info!(account = name, "re-uploading from backup");

        if self.settings.dry_run {
            self.dry_run("Account Re-enable", &message, Severity::Info, report)
                .await;
            return;
        }

        let content = match backups.load(name) {
            Ok(Some(content)) => content,
            Ok(None) => {
                self.abandon(name, "no backup available", ledger, report)
                    .await;
                return;
            }
            Err(e) => {
                warn!(account = name, error = %e, "failed to read backup, will retry next cycle");
                report.failures += 1;
                record_transition("reenable", "backup_failed");
                return;
            }
        };

        if let Err(e) = self.api.upload_auth_file(name, content).await {
            warn!(account = name, error = %e, "re-upload failed, will retry next cycle");
            report.failures += 1;
            record_transition("reenable", "failed");
            return;
        }

        ledger.remove(name);
        if let Err(e) = backups.remove(name) {
            warn!(account = name, error = %e, "re-enabled but could not remove backup");
        }
        report.reenabled += 1;
        record_transition("reenable", "ok");
        self.notifier
            .send(
                "Account Re-enabled",
                &format!("Account {name} re-uploaded from backup"),
                Severity::Info,
            )
            .await;
    }

    async fn adopt(&self, name: &str, ledger: &mut DisabledLedger, report: &mut CycleReport) {
        let message = format!(
            "Account {name} is listed upstream again with healthy quota, no longer tracked as disabled"
        );
        info!(account = name, "credential restored externally, releasing it");

        if self.settings.dry_run {
            self.dry_run("Account Recovered", &message, Severity::Info, report)
                .await;
            return;
        }

        ledger.remove(name);
        if let Strategy::Delete { backups } = &self.strategy {
            if let Err(e) = backups.remove(name) {
                warn!(account = name, error = %e, "could not remove stale backup");
            }
        }
        report.adopted += 1;
        record_transition("adopt", "ok");
        self.notifier
            .send("Account Recovered", &message, Severity::Info)
            .await;
    }

    /// Stop tracking a credential that can no longer be re-enabled.
    async fn abandon(
        &self,
        name: &str,
        reason: &str,
        ledger: &mut DisabledLedger,
        report: &mut CycleReport,
    ) {
        warn!(account = name, reason, "cannot re-enable, no longer tracking");
        ledger.remove(name);
        report.abandoned += 1;
        record_transition("reenable", "abandoned");
        self.notifier
            .send(
                "Re-enable Abandoned",
                &format!("Account {name} cannot be re-enabled ({reason}) and needs manual attention"),
                Severity::Warning,
            )
            .await;
    }

    async fn dry_run(
        &self,
        title: &str,
        message: &str,
        severity: Severity,
        report: &mut CycleReport,
    ) {
        info!(detail = message, "dry run, not applying");
        report.dry_run_actions += 1;
        self.notifier
            .send(&format!("{DRY_RUN_PREFIX}{title}"), message, severity)
            .await;
    }

    fn describe_exhaustion(&self, record: &AuthFile, verdict: &Verdict) -> String {
        match (self.settings.detection, verdict.remaining()) {
            (Detection::Percent { threshold }, Some(remaining)) => format!(
                "Account {} quota at {remaining:.1}% (threshold {threshold}%), disabling",
                record.name
            ),
            _ => format!(
                "Account {} reports quota exhaustion (status: {:?}, message: {:?}), disabling",
                record.name,
                record.status_code(),
                record.message()
            ),
        }
    }
}

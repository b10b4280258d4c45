//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults. A missing config file
//! is not an error; the guard can be configured entirely through `CPA_*`
//! variables. The management key is loaded from CPA_MANAGEMENT_KEY or
//! `management.key_file`, never stored in the TOML directly.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use auth_guard::{Detection, ProviderFilter, StrategyKind};
use common::Secret;
use serde::Deserialize;

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub management: ManagementConfig,
    pub guard: GuardConfig,
    pub backup: BackupConfig,
    pub notify: NotifyConfig,
    pub status: StatusConfig,
}

/// Management API connection settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ManagementConfig {
    pub base_url: String,
    #[serde(skip)]
    pub key: Option<Secret<String>>,
    /// Path to a file containing the management key (alternative to CPA_MANAGEMENT_KEY)
    pub key_file: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            base_url: cpa_management::DEFAULT_BASE_URL.to_owned(),
            key: None,
            key_file: None,
            timeout_secs: cpa_management::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Decision policy
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub poll_interval_secs: u64,
    /// Percent remaining below which a credential counts as exhausted.
    pub quota_threshold: f64,
    /// Case-insensitive substrings; empty means every credential is in scope.
    pub provider_filter: Vec<String>,
    pub dry_run: bool,
    pub strategy: StrategyChoice,
    pub detection: DetectionChoice,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            quota_threshold: 10.0,
            provider_filter: Vec::new(),
            dry_run: false,
            strategy: StrategyChoice::Delete,
            detection: DetectionChoice::Percent,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub dir: PathBuf,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/data/backups"),
        }
    }
}

/// Outbound webhook settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 10,
        }
    }
}

/// Optional status listener serving /health and /metrics
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub listen_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyChoice {
    Delete,
    Toggle,
}

impl FromStr for StrategyChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "delete" => Ok(StrategyChoice::Delete),
            "toggle" => Ok(StrategyChoice::Toggle),
            other => Err(format!("expected \"delete\" or \"toggle\", got {other:?}")),
        }
    }
}

impl From<StrategyChoice> for StrategyKind {
    fn from(choice: StrategyChoice) -> Self {
        match choice {
            StrategyChoice::Delete => StrategyKind::Delete,
            StrategyChoice::Toggle => StrategyKind::Toggle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionChoice {
    Percent,
    Keyword,
}

impl FromStr for DetectionChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "percent" => Ok(DetectionChoice::Percent),
            "keyword" => Ok(DetectionChoice::Keyword),
            other => Err(format!("expected \"percent\" or \"keyword\", got {other:?}")),
        }
    }
}

impl Config {
    /// Load configuration from `path` (if present), overlay environment
    /// variables, resolve the management key and validate.
    pub fn load(path: &Path) -> common::Result<Self> {
        Self::load_with(path, |var| std::env::var(var).ok())
    }

    /// `load` with an injectable environment.
    pub fn load_with<F>(path: &Path, lookup: F) -> common::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config = match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(e.into()),
        };

        config.apply_overrides(&lookup)?;
        config.resolve_key(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> common::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("CPA_BASE_URL") {
            self.management.base_url = url.trim().to_owned();
        }
        if let Some(raw) = lookup("CPA_POLL_INTERVAL") {
            self.guard.poll_interval_secs = parse_env("CPA_POLL_INTERVAL", &raw)?;
        }
        if let Some(raw) = lookup("CPA_QUOTA_THRESHOLD") {
            self.guard.quota_threshold = parse_env("CPA_QUOTA_THRESHOLD", &raw)?;
        }
        if let Some(raw) = lookup("CPA_PROVIDER_FILTER") {
            self.guard.provider_filter = raw
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(url) = lookup("CPA_WEBHOOK_URL") {
            let url = url.trim();
            self.notify.webhook_url = (!url.is_empty()).then(|| url.to_owned());
        }
        if let Some(dir) = lookup("CPA_BACKUP_DIR") {
            self.backup.dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("CPA_DRY_RUN") {
            self.guard.dry_run = matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "yes");
        }
        if let Some(raw) = lookup("CPA_STRATEGY") {
            self.guard.strategy = parse_env("CPA_STRATEGY", &raw)?;
        }
        if let Some(raw) = lookup("CPA_DETECTION") {
            self.guard.detection = parse_env("CPA_DETECTION", &raw)?;
        }
        if let Some(raw) = lookup("CPA_STATUS_ADDR") {
            self.status.listen_addr = Some(parse_env("CPA_STATUS_ADDR", &raw)?);
        }
        Ok(())
    }

    /// Resolve the management key: env var takes precedence over file.
    fn resolve_key<F>(&mut self, lookup: &F) -> common::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("CPA_MANAGEMENT_KEY").and_then(|k| Secret::from_trimmed(&k)) {
            self.management.key = Some(key);
        } else if let Some(ref key_file) = self.management.key_file {
            let raw = std::fs::read_to_string(key_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read key_file {}: {e}",
                    key_file.display()
                ))
            })?;
            self.management.key = Secret::from_trimmed(&raw);
        }
        Ok(())
    }

    fn validate(&self) -> common::Result<()> {
        let base_url = &self.management.base_url;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {base_url}"
            )));
        }

        if self.management.key.is_none() {
            return Err(common::Error::Config(
                "management key is required (set CPA_MANAGEMENT_KEY or management.key_file)"
                    .into(),
            ));
        }

        for (name, value) in [
            ("poll_interval_secs", self.guard.poll_interval_secs),
            ("management.timeout_secs", self.management.timeout_secs),
            ("notify.timeout_secs", self.notify.timeout_secs),
        ] {
            if value == 0 {
                return Err(common::Error::Config(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        let threshold = self.guard.quota_threshold;
        if !(0.0..=100.0).contains(&threshold) {
            return Err(common::Error::Config(format!(
                "quota_threshold must be between 0 and 100, got: {threshold}"
            )));
        }

        Ok(())
    }

    pub fn detection(&self) -> Detection {
        match self.guard.detection {
            DetectionChoice::Percent => Detection::Percent {
                threshold: self.guard.quota_threshold,
            },
            DetectionChoice::Keyword => Detection::Keyword,
        }
    }

    pub fn filter(&self) -> ProviderFilter {
        ProviderFilter::new(&self.guard.provider_filter)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("cpa-quota-guard.toml")
    }
}

fn parse_env<T>(var: &str, raw: &str) -> common::Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| common::Error::Env {
        var: var.to_owned(),
        message: format!("{e} (got {raw:?})"),
    })
}

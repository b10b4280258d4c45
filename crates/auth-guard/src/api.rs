//! Collaborator seams: the remote management service and the notification sink
//!
//! Both traits return `Pin<Box<dyn Future>>` so they stay dyn-compatible and can
//! be shared as `Arc<dyn ...>` between the poll task and the binary.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use cpa_management::AuthFile;
use serde::Serialize;

use crate::error::Result;

/// Boxed future returned by every `ManagementApi` call.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Narrow view of the management service used by the lifecycle.
///
/// The lifecycle maps its abstract "disable" and "restore" steps onto these
/// calls according to the configured strategy: delete/upload for
/// `Strategy::Delete`, `set_disabled` for `Strategy::Toggle`.
pub trait ManagementApi: Send + Sync {
    /// Current snapshot of every credential.
    fn list_auth_files(&self) -> RemoteFuture<'_, Vec<AuthFile>>;

    /// Raw content of a credential, saved before a destructive disable.
    fn download_auth_file<'a>(&'a self, name: &'a str) -> RemoteFuture<'a, Vec<u8>>;

    fn delete_auth_file<'a>(&'a self, name: &'a str) -> RemoteFuture<'a, ()>;

    fn upload_auth_file<'a>(&'a self, name: &'a str, content: Vec<u8>) -> RemoteFuture<'a, ()>;

    fn set_disabled<'a>(&'a self, name: &'a str, disabled: bool) -> RemoteFuture<'a, ()>;
}

/// Severity attached to an outbound notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best-effort event sink.
///
/// The output type is `()`: delivery failures are the sink's business to log
/// and swallow, and can never unwind a transition that already happened.
pub trait Notifier: Send + Sync {
    fn send<'a>(
        &'a self,
        title: &'a str,
        message: &'a str,
        severity: Severity,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

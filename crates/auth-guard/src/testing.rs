//! In-memory collaborators for unit tests

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use cpa_management::AuthFile;

use crate::api::{ManagementApi, Notifier, RemoteFuture, Severity};
use crate::error::{Error, Result};

/// A call received by `FakeApi`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Download(String),
    Delete(String),
    Upload(String, Vec<u8>),
    SetDisabled(String, bool),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::Delete(_) | Call::Upload(..) | Call::SetDisabled(..)
        )
    }
}

/// Management API double. Serves a snapshot (until replaced), drops a record
/// once its delete succeeds, and records every call. Operations or names
/// can be made to fail on demand.
#[derive(Default)]
pub struct FakeApi {
    snapshot: Mutex<Vec<AuthFile>>,
    contents: Mutex<HashMap<String, Vec<u8>>>,
    failing_ops: Mutex<HashSet<&'static str>>,
    failing_names: Mutex<HashSet<String>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeApi {
    pub fn with_snapshot(records: Vec<AuthFile>) -> Self {
        let api = Self::default();
        api.set_snapshot(records);
        api
    }

    pub fn set_snapshot(&self, records: Vec<AuthFile>) {
        *self.snapshot.lock().unwrap() = records;
    }

    pub fn set_content(&self, name: &str, content: &[u8]) {
        self.contents
            .lock()
            .unwrap()
            .insert(name.to_owned(), content.to_vec());
    }

    /// Make every call of `op` fail ("list", "download", "delete", "upload",
    /// "set_disabled").
    pub fn fail(&self, op: &'static str) {
        self.failing_ops.lock().unwrap().insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        self.failing_ops.lock().unwrap().remove(op);
    }

    /// Make every call that targets `name` fail.
    pub fn fail_name(&self, name: &str) {
        self.failing_names.lock().unwrap().insert(name.to_owned());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    fn record(&self, call: Call, op: &'static str, name: Option<&str>) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing_ops.lock().unwrap().contains(op) {
            return Err(Error::Remote(format!("{op} unavailable")));
        }
        if let Some(name) = name {
            if self.failing_names.lock().unwrap().contains(name) {
                return Err(Error::Remote(format!("{op} rejected for {name}")));
            }
        }
        Ok(())
    }
}

impl ManagementApi for FakeApi {
    fn list_auth_files(&self) -> RemoteFuture<'_, Vec<AuthFile>> {
        Box::pin(async move {
            self.record(Call::List, "list", None)?;
            Ok(self.snapshot.lock().unwrap().clone())
        })
    }

    fn download_auth_file<'a>(&'a self, name: &'a str) -> RemoteFuture<'a, Vec<u8>> {
        Box::pin(async move {
            self.record(Call::Download(name.to_owned()), "download", Some(name))?;
            let content = self
                .contents
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .unwrap_or_else(|| format!("{{\"name\":\"{name}\"}}").into_bytes());
            Ok(content)
        })
    }

    fn delete_auth_file<'a>(&'a self, name: &'a str) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            self.record(Call::Delete(name.to_owned()), "delete", Some(name))?;
            self.snapshot.lock().unwrap().retain(|r| r.name != name);
            Ok(())
        })
    }

    fn upload_auth_file<'a>(&'a self, name: &'a str, content: Vec<u8>) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            self.record(Call::Upload(name.to_owned(), content), "upload", Some(name))
        })
    }

    fn set_disabled<'a>(&'a self, name: &'a str, disabled: bool) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            self.record(
                Call::SetDisabled(name.to_owned(), disabled),
                "set_disabled",
                Some(name),
            )
        })
    }
}

/// Notifier double that keeps every event.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(String, String, Severity)>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<(String, String, Severity)> {
        self.events.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.events().into_iter().map(|(title, ..)| title).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn send<'a>(
        &'a self,
        title: &'a str,
        message: &'a str,
        severity: Severity,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.events
                .lock()
                .unwrap()
                .push((title.to_owned(), message.to_owned(), severity));
        })
    }
}

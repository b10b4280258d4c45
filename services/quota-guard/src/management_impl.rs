//! Management API backend for the guard
//!
//! Binds the concrete `cpa_management::Client` to the `ManagementApi` seam the
//! lifecycle is written against. Transport and API errors are folded into
//! `auth_guard::Error::Remote`.

use auth_guard::{ManagementApi, RemoteFuture};
use cpa_management::{AuthFile, Client};
use tracing::{info, warn};

pub struct ManagementBackend {
    client: Client,
}

impl ManagementBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// One-off `usage` call at startup so a wrong base URL or key shows up in
    /// the logs immediately. Never fatal; the poll loop retries regardless.
    pub async fn check_reachable(&self) -> bool {
        match self.client.usage().await {
            Ok(_) => {
                info!(base_url = self.client.base_url(), "management API reachable");
                true
            }
            Err(e) => {
                warn!(
                    base_url = self.client.base_url(),
                    error = %e,
                    "management API unreachable, continuing"
                );
                false
            }
        }
    }
}

impl ManagementApi for ManagementBackend {
    fn list_auth_files(&self) -> RemoteFuture<'_, Vec<AuthFile>> {
        Box::pin(async move { Ok(self.client.list_auth_files().await?) })
    }

    fn download_auth_file<'a>(&'a self, name: &'a str) -> RemoteFuture<'a, Vec<u8>> {
        Box::pin(async move { Ok(self.client.download_auth_file(name).await?) })
    }

    fn delete_auth_file<'a>(&'a self, name: &'a str) -> RemoteFuture<'a, ()> {
        Box::pin(async move { Ok(self.client.delete_auth_file(name).await?) })
    }

    fn upload_auth_file<'a>(&'a self, name: &'a str, content: Vec<u8>) -> RemoteFuture<'a, ()> {
        Box::pin(async move { Ok(self.client.upload_auth_file(name, content).await?) })
    }

    fn set_disabled<'a>(&'a self, name: &'a str, disabled: bool) -> RemoteFuture<'a, ()> {
        Box::pin(async move { Ok(self.client.set_auth_file_status(name, disabled).await?) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use common::Secret;
    use tokio::net::TcpListener;

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn backend(base_url: &str) -> ManagementBackend {
        let client = Client::new(
            base_url,
            Secret::new("k".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        ManagementBackend::new(client)
    }

    #[tokio::test]
    async fn lists_through_the_client() {
        let app = Router::new().route(
            "/v0/management/auth-files",
            get(|| async {
                axum::Json(serde_json::json!([
                    {"name": "a.json", "provider": "claude", "disabled": true}
                ]))
            }),
        );
        let backend = backend(&serve(app).await);

        let records = backend.list_auth_files().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "a.json");
        assert!(records[0].is_disabled());
    }

    #[tokio::test]
    async fn api_errors_become_remote_errors() {
        let app = Router::new().route(
            "/v0/management/auth-files",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") })
                .delete(|| async { (StatusCode::NOT_FOUND, "no such file") }),
        );
        let backend = backend(&serve(app).await);

        let err = backend.list_auth_files().await.unwrap_err();
        assert!(matches!(err, auth_guard::Error::Remote(_)), "got: {err:?}");
        assert!(err.to_string().contains("500"), "got: {err}");

        let err = backend.delete_auth_file("a.json").await.unwrap_err();
        assert!(err.to_string().contains("no such file"), "got: {err}");
    }

    #[tokio::test]
    async fn check_reachable_reports_reachability() {
        let app = Router::new().route(
            "/v0/management/usage",
            get(|| async { axum::Json(serde_json::json!({"usage": {"total_requests": 3}})) }),
        );
        assert!(backend(&serve(app).await).check_reachable().await);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        assert!(!backend(&format!("http://{addr}")).check_reachable().await);
    }
}

//! Typed wrapper over the `/v0/management` auth-file endpoints
//!
//! Every call carries the management key as a Bearer token and is bounded by
//! the timeout configured on the underlying `reqwest::Client`. Non-2xx answers
//! are surfaced as `Error::Api` with the upstream body so the caller can log
//! what the service actually said.

use std::time::Duration;

use common::Secret;
use reqwest::multipart::{Form, Part};
use tracing::{debug, info};

use crate::auth_file::{AuthFile, parse_auth_files};
use crate::constants::{API_PREFIX, AUTH_FILE_CONTENT_TYPE};
use crate::error::{Error, Result};

/// Management API client. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    management_key: Secret<String>,
}

impl Client {
    /// Build a client for `base_url` (trailing `/` is ignored).
    pub fn new(base_url: &str, management_key: Secret<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("building HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            management_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.management_key.expose())
    }

    /// `GET /auth-files`: current snapshot of every credential.
    pub async fn list_auth_files(&self) -> Result<Vec<AuthFile>> {
        let response = self
            .http
            .get(self.url("/auth-files"))
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .send()
            .await
            .map_err(|e| Error::Http(format!("listing auth files: {e}")))?;

        let body: serde_json::Value = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Decode(format!("auth file listing: {e}")))?;

        let files = parse_auth_files(body);
        debug!(count = files.len(), "listed auth files");
        Ok(files)
    }

    /// `PATCH /auth-files/status`: flip the upstream `disabled` flag.
    pub async fn set_auth_file_status(&self, name: &str, disabled: bool) -> Result<()> {
        let response = self
            .http
            .patch(self.url("/auth-files/status"))
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .json(&serde_json::json!({ "name": name, "disabled": disabled }))
            .send()
            .await
            .map_err(|e| Error::Http(format!("updating status of {name}: {e}")))?;

        check_status(response).await?;
        info!(account = name, disabled, "auth file status updated");
        Ok(())
    }

    /// `GET /auth-files/download?name=`: raw credential content.
    pub async fn download_auth_file(&self, name: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(self.url("/auth-files/download"))
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .query(&[("name", name)])
            .send()
            .await
            .map_err(|e| Error::Http(format!("downloading {name}: {e}")))?;

        let bytes = check_status(response)
            .await?
            .bytes()
            .await
            .map_err(|e| Error::Http(format!("reading download of {name}: {e}")))?;
        debug!(account = name, bytes = bytes.len(), "downloaded auth file");
        Ok(bytes.to_vec())
    }

    /// `DELETE /auth-files?name=`: remove a credential upstream.
    pub async fn delete_auth_file(&self, name: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url("/auth-files"))
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .query(&[("name", name)])
            .send()
            .await
            .map_err(|e| Error::Http(format!("deleting {name}: {e}")))?;

        check_status(response).await?;
        info!(account = name, "auth file deleted");
        Ok(())
    }

    /// `POST /auth-files/upload`: re-create a credential from its content.
    pub async fn upload_auth_file(&self, name: &str, content: Vec<u8>) -> Result<()> {
        let part = Part::bytes(content)
            .file_name(name.to_owned())
            .mime_str(AUTH_FILE_CONTENT_TYPE)
            .map_err(|e| Error::Http(format!("building upload of {name}: {e}")))?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(self.url("/auth-files/upload"))
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Http(format!("uploading {name}: {e}")))?;

        check_status(response).await?;
        info!(account = name, "auth file uploaded");
        Ok(())
    }

    /// `GET /usage`: request statistics, returned as-is.
    pub async fn usage(&self) -> Result<serde_json::Value> {
        let response = self
            .http
            .get(self.url("/usage"))
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .send()
            .await
            .map_err(|e| Error::Http(format!("fetching usage: {e}")))?;

        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Decode(format!("usage statistics: {e}")))
    }
}

/// Turn a non-2xx response into `Error::Api`, keeping the body for the log.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<no body>"));
    Err(Error::Api {
        status: status.as_u16(),
        body,
    })
}

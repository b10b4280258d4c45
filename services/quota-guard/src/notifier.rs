//! Webhook notification sink
//!
//! Posts one JSON document per event. Delivery is best effort: failures are
//! logged and dropped so a broken webhook can never stall or fail a cycle.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use auth_guard::{Notifier, Severity};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    title: &'a str,
    message: &'a str,
    level: Severity,
    timestamp: String,
}

/// Notifier that POSTs to a webhook URL. Without a URL it only logs.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: Option<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    async fn deliver(&self, url: &str, payload: &WebhookPayload<'_>) {
        match self.client.post(url).json(payload).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(title = payload.title, "webhook delivered");
            }
            Ok(response) => {
                warn!(
                    title = payload.title,
                    status = response.status().as_u16(),
                    "webhook rejected notification"
                );
            }
            Err(e) => {
                warn!(title = payload.title, error = %e, "webhook delivery failed");
            }
        }
    }
}

impl Notifier for WebhookNotifier {
    fn send<'a>(
        &'a self,
        title: &'a str,
        message: &'a str,
        severity: Severity,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            info!(title, detail = message, level = %severity, "notification");

            let Some(url) = self.url.as_deref() else {
                return;
            };
            let payload = WebhookPayload {
                title,
                message,
                level: severity,
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            };
            self.deliver(url, &payload).await;
        })
    }
}

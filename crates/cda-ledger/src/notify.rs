// Copyright 2026 Boundless Foundation, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Best-effort operator notifications. Every notification is logged; when a
//! webhook is configured it additionally receives an embed-style payload.
//! Delivery failures are logged and swallowed — notification is a side
//! channel and must never abort the caller's primary flow.

use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Success,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Success => "success",
        }
    }

    fn embed_color(&self) -> u32 {
        match self {
            Severity::Info => 0x3498db,
            Severity::Warning => 0xf39c12,
            Severity::Error => 0xe74c3c,
            Severity::Success => 0x2ecc71,
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    source: String,
    webhook: Option<Url>,
    http: reqwest::Client,
}

impl Notifier {
    pub fn new(source: impl Into<String>, webhook: Option<Url>) -> Self {
        Self { source: source.into(), webhook, http: reqwest::Client::new() }
    }

    pub async fn send(&self, severity: Severity, title: &str, message: &str) {
        match severity {
            Severity::Error => tracing::error!("NOTIFICATION [{}] {title}: {message}", severity.as_str()),
            Severity::Warning => {
                tracing::warn!("NOTIFICATION [{}] {title}: {message}", severity.as_str())
            }
            _ => tracing::info!("NOTIFICATION [{}] {title}: {message}", severity.as_str()),
        }

        let Some(webhook) = &self.webhook else { return };

        let payload = serde_json::json!({
            "embeds": [{
                "title": title,
                "description": message,
                "color": severity.embed_color(),
                "footer": { "text": self.source },
            }],
        });

        let delivery = self
            .http
            .post(webhook.clone())
            .json(&payload)
            .send()
            .await
            .and_then(|resp| resp.error_for_status());
        if let Err(err) = delivery {
            tracing::warn!("Notification delivery to webhook failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;

    #[tokio::test]
    async fn posts_embed_to_webhook() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/hook")
                    .json_body_partial(r#"{"embeds": [{"title": "Reset Reminder"}]}"#);
                then.status(204);
            })
            .await;

        let webhook = server.url("/hook").parse().unwrap();
        let notifier = Notifier::new("test", Some(webhook));
        notifier.send(Severity::Warning, "Reset Reminder", "30 days remain").await;

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/hook");
                then.status(500);
            })
            .await;

        let webhook = server.url("/hook").parse().unwrap();
        let notifier = Notifier::new("test", Some(webhook));
        // Must not panic or propagate.
        notifier.send(Severity::Error, "Reset Failed", "boom").await;
    }

    #[tokio::test]
    async fn no_webhook_logs_only() {
        let notifier = Notifier::new("test", None);
        notifier.send(Severity::Info, "Reset Dry Run", "no-op").await;
    }
}

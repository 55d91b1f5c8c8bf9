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

//! Node liveness probes. A node is online iff its `eth_blockNumber` call
//! returns HTTP success within the timeout; on success the sync status is
//! probed as well. Probing never fails outward — every failure mode becomes
//! an offline record.

use std::time::Instant;

use anyhow::{Context, Result};
use cda_ledger::schedule::now_secs;
use tokio::time::Duration;
use url::Url;

use crate::registry::UptimeRecord;

/// Per-probe response bound.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct HealthChecker {
    http: reqwest::Client,
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthChecker {
    pub fn new() -> Self {
        Self { http: reqwest::Client::new() }
    }

    /// Probes one endpoint and returns exactly one record.
    pub async fn probe(&self, endpoint: &Url) -> UptimeRecord {
        let started = Instant::now();
        let timestamp = now_secs();

        match self.block_number(endpoint).await {
            Ok(block_height) => {
                let synced = match self.sync_status(endpoint).await {
                    Ok(synced) => Some(synced),
                    Err(err) => {
                        tracing::debug!("Sync probe failed for {endpoint}: {err:#}");
                        None
                    }
                };
                UptimeRecord {
                    timestamp,
                    online: true,
                    block_height: Some(block_height),
                    response_time_ms: Some(started.elapsed().as_millis() as u64),
                    synced,
                }
            }
            Err(err) => {
                tracing::debug!("Liveness probe failed for {endpoint}: {err:#}");
                UptimeRecord {
                    timestamp,
                    online: false,
                    block_height: None,
                    response_time_ms: Some(started.elapsed().as_millis() as u64),
                    synced: None,
                }
            }
        }
    }

    async fn rpc_call(&self, endpoint: &Url, method: &str, id: u32) -> Result<serde_json::Value> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": [],
            "id": id,
        });
        let resp = self
            .http
            .post(endpoint.clone())
            .timeout(PROBE_TIMEOUT)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{method} request failed"))?
            .error_for_status()
            .with_context(|| format!("{method} returned an error status"))?;
        let payload: serde_json::Value =
            resp.json().await.with_context(|| format!("{method} response was not JSON"))?;
        payload
            .get("result")
            .cloned()
            .with_context(|| format!("{method} response carried no result"))
    }

    async fn block_number(&self, endpoint: &Url) -> Result<u64> {
        let result = self.rpc_call(endpoint, "eth_blockNumber", 1).await?;
        let hex = result.as_str().context("eth_blockNumber result was not a string")?;
        u64::from_str_radix(hex.trim_start_matches("0x"), 16)
            .context("eth_blockNumber result was not a hex quantity")
    }

    /// `eth_syncing` returns `false` when fully synced, or a progress object
    /// while catching up.
    async fn sync_status(&self, endpoint: &Url) -> Result<bool> {
        let result = self.rpc_call(endpoint, "eth_syncing", 2).await?;
        Ok(result == serde_json::Value::Bool(false))
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;

    #[tokio::test]
    async fn healthy_node_produces_online_record() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/").json_body_partial(r#"{"method": "eth_blockNumber"}"#);
                then.status(200).json_body(serde_json::json!({
                    "jsonrpc": "2.0", "id": 1, "result": "0x10a2f"
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/").json_body_partial(r#"{"method": "eth_syncing"}"#);
                then.status(200).json_body(serde_json::json!({
                    "jsonrpc": "2.0", "id": 2, "result": false
                }));
            })
            .await;

        let endpoint = server.base_url().parse().unwrap();
        let record = HealthChecker::new().probe(&endpoint).await;

        assert!(record.online);
        assert_eq!(record.block_height, Some(0x10a2f));
        assert_eq!(record.synced, Some(true));
        assert!(record.response_time_ms.is_some());
    }

    #[tokio::test]
    async fn syncing_node_is_online_but_not_synced() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/").json_body_partial(r#"{"method": "eth_blockNumber"}"#);
                then.status(200)
                    .json_body(serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": "0x1"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/").json_body_partial(r#"{"method": "eth_syncing"}"#);
                then.status(200).json_body(serde_json::json!({
                    "jsonrpc": "2.0", "id": 2,
                    "result": {"startingBlock": "0x0", "currentBlock": "0x1", "highestBlock": "0x1000"}
                }));
            })
            .await;

        let endpoint = server.base_url().parse().unwrap();
        let record = HealthChecker::new().probe(&endpoint).await;

        assert!(record.online);
        assert_eq!(record.synced, Some(false));
    }

    #[tokio::test]
    async fn server_error_produces_offline_record() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(503);
            })
            .await;

        let endpoint = server.base_url().parse().unwrap();
        let record = HealthChecker::new().probe(&endpoint).await;

        assert!(!record.online);
        assert_eq!(record.block_height, None);
    }

    #[tokio::test]
    async fn unreachable_endpoint_produces_offline_record() {
        // Nothing listens on this port.
        let endpoint = "http://127.0.0.1:9".parse().unwrap();
        let record = HealthChecker::new().probe(&endpoint).await;
        assert!(!record.online);
    }

    #[tokio::test]
    async fn garbage_response_produces_offline_record() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(200).body("not json");
            })
            .await;

        let endpoint = server.base_url().parse().unwrap();
        let record = HealthChecker::new().probe(&endpoint).await;
        assert!(!record.online);
    }
}

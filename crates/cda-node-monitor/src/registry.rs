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

use std::{collections::BTreeMap, path::Path};

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// One health-check outcome. Immutable once appended; ordering by timestamp
/// is significant for window math.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UptimeRecord {
    /// Epoch seconds.
    pub timestamp: u64,
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synced: Option<bool>,
}

/// A monitored infrastructure endpoint and its rolling uptime history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Stable identifier, unique within the fleet.
    pub address: String,
    pub name: String,
    pub endpoint: Url,
    /// Where this node's operator receives rewards.
    pub operator_address: Address,
    #[serde(default)]
    pub last_checked: u64,
    #[serde(default)]
    pub uptime_history: Vec<UptimeRecord>,
}

impl NodeInfo {
    /// Appends a check outcome and advances the last-checked marker.
    pub fn push_record(&mut self, record: UptimeRecord) {
        self.last_checked = record.timestamp;
        self.uptime_history.push(record);
    }

    /// Drops records at or before the cutoff. History within the window is
    /// append-only; this is the only removal path.
    pub fn prune_before(&mut self, cutoff: u64) {
        self.uptime_history.retain(|record| record.timestamp > cutoff);
    }

    pub fn latest(&self) -> Option<&UptimeRecord> {
        self.uptime_history.last()
    }
}

#[derive(Debug, Deserialize)]
struct NodeConfigFile {
    nodes: Vec<NodeInfo>,
}

/// The fleet under monitoring: an explicit owned collection keyed by node
/// address, constructed per monitor instance from injected configuration.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<String, NodeInfo>,
}

impl NodeRegistry {
    pub fn new(nodes: Vec<NodeInfo>) -> Self {
        let nodes = nodes.into_iter().map(|node| (node.address.clone(), node)).collect();
        Self { nodes }
    }

    /// Loads the fleet from a `{"nodes": [...]}` JSON file.
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read node configuration {}", path.display()))?;
        let config: NodeConfigFile = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse node configuration {}", path.display()))?;
        tracing::info!("Loaded {} nodes from {}", config.nodes.len(), path.display());
        Ok(Self::new(config.nodes))
    }

    /// Merges persisted history back into the configured fleet. Unknown
    /// addresses are ignored: configuration decides fleet membership.
    pub fn restore_history(&mut self, saved: Vec<NodeInfo>) {
        for node in saved {
            if let Some(existing) = self.nodes.get_mut(&node.address) {
                existing.last_checked = node.last_checked;
                existing.uptime_history = node.uptime_history;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get_mut(&mut self, address: &str) -> Option<&mut NodeInfo> {
        self.nodes.get_mut(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeInfo> {
        self.nodes.values()
    }

    /// A consistent clone of the fleet, taken before computations that must
    /// see a single denominator across all nodes.
    pub fn snapshot(&self) -> Vec<NodeInfo> {
        self.nodes.values().cloned().collect()
    }

    pub fn last_checked(&self) -> u64 {
        self.nodes.values().map(|node| node.last_checked).max().unwrap_or(0)
    }
}

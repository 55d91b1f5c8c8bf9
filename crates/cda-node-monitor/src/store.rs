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

//! Durable state for restart recovery: the uptime snapshot and the monthly
//! reward ledger, each a single-owner JSON file replaced atomically on save.
//! Loads fall back to empty state on a missing file and warn on a corrupt
//! one.

use std::path::{Path, PathBuf};

use alloy::primitives::{Address, U256};
use anyhow::Result;
use cda_ledger::reports::write_json_atomic;
use serde::{Deserialize, Serialize};

use crate::registry::NodeInfo;

/// One apportionment outcome for a node/operator pair in a given month.
/// `distributed` flips true only after the on-chain call succeeds; it is the
/// idempotency guard against paying the same month twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyReward {
    /// `YYYY-MM` key of the rewarded month.
    pub month: String,
    pub node_address: String,
    pub operator_address: Address,
    pub uptime_percentage: f64,
    pub reward_amount: U256,
    pub distributed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptimeSnapshot {
    pub last_updated: String,
    pub nodes: Vec<NodeInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewardLedger {
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub monthly_rewards: Vec<MonthlyReward>,
}

impl RewardLedger {
    pub fn month_records<'a>(&'a self, month: &'a str) -> impl Iterator<Item = &'a MonthlyReward> + 'a {
        self.monthly_rewards.iter().filter(move |r| r.month == month)
    }

    /// True when the month has records and every one of them is paid out —
    /// the signal to skip a re-run entirely.
    pub fn month_complete(&self, month: &str) -> bool {
        let mut any = false;
        for record in self.month_records(month) {
            any = true;
            if !record.distributed {
                return false;
            }
        }
        any
    }

    pub fn find(&self, month: &str, node_address: &str) -> Option<&MonthlyReward> {
        self.monthly_rewards.iter().find(|r| r.month == month && r.node_address == node_address)
    }

    pub fn find_mut(&mut self, month: &str, node_address: &str) -> Option<&mut MonthlyReward> {
        self.monthly_rewards.iter_mut().find(|r| r.month == month && r.node_address == node_address)
    }

    pub fn total_distributed(&self) -> U256 {
        self.monthly_rewards
            .iter()
            .filter(|r| r.distributed)
            .map(|r| r.reward_amount)
            .sum()
    }
}

#[derive(Debug, Clone)]
pub struct DataStore {
    uptime_path: PathBuf,
    rewards_path: PathBuf,
}

impl DataStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            uptime_path: data_dir.join("node-uptime.json"),
            rewards_path: data_dir.join("node-rewards.json"),
        }
    }

    pub fn load_uptime(&self) -> Option<UptimeSnapshot> {
        load_or_warn(&self.uptime_path)
    }

    pub fn save_uptime(&self, snapshot: &UptimeSnapshot) -> Result<()> {
        write_json_atomic(&self.uptime_path, snapshot)
    }

    pub fn load_rewards(&self) -> RewardLedger {
        load_or_warn(&self.rewards_path).unwrap_or_default()
    }

    pub fn save_rewards(&self, ledger: &RewardLedger) -> Result<()> {
        write_json_atomic(&self.rewards_path, ledger)
    }
}

fn load_or_warn<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("Failed to parse {}, starting fresh: {err}", path.display());
                None
            }
        },
        Err(err) => {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read {}, starting fresh: {err}", path.display());
            }
            None
        }
    }
}

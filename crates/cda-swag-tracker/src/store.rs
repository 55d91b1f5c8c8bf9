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

use std::path::{Path, PathBuf};

use alloy::primitives::{Address, U256};
use anyhow::Result;
use cda_ledger::reports::write_json_atomic;
use serde::{Deserialize, Serialize};

/// One observed redemption. Keyed by `redemption_id`; chain events may be
/// delivered more than once, so application is idempotent on that key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedemptionRecord {
    pub redemption_id: u64,
    pub user: Address,
    pub item_id: u64,
    pub item_name: String,
    pub cda_cost: U256,
    pub timestamp: u64,
    pub fulfilled: bool,
    pub shipping_info: String,
}

/// Tracker state: the redemption log plus the polling cursor, persisted as
/// one single-owner file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackingData {
    #[serde(default)]
    pub last_updated: String,
    /// Next block to scan for events.
    #[serde(default)]
    pub last_processed_block: u64,
    #[serde(default)]
    pub records: Vec<RedemptionRecord>,
}

impl TrackingData {
    pub fn contains(&self, redemption_id: u64) -> bool {
        self.records.iter().any(|r| r.redemption_id == redemption_id)
    }

    /// Inserts unless the id is already known. Returns whether the record
    /// was new.
    pub fn insert(&mut self, record: RedemptionRecord) -> bool {
        if self.contains(record.redemption_id) {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Returns whether a record with the id existed.
    pub fn set_fulfilled(&mut self, redemption_id: u64, fulfilled: bool) -> bool {
        match self.records.iter_mut().find(|r| r.redemption_id == redemption_id) {
            Some(record) => {
                record.fulfilled = fulfilled;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwagStore {
    path: PathBuf,
}

impl SwagStore {
    pub fn new(data_dir: &Path) -> Self {
        Self { path: data_dir.join("swag-tracking.json") }
    }

    pub fn load(&self) -> TrackingData {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(data) => data,
                Err(err) => {
                    tracing::warn!(
                        "Failed to parse {}, starting fresh: {err}",
                        self.path.display()
                    );
                    TrackingData::default()
                }
            },
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to read {}, starting fresh: {err}", self.path.display());
                }
                TrackingData::default()
            }
        }
    }

    pub fn save(&self, data: &TrackingData) -> Result<()> {
        write_json_atomic(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn record(id: u64, fulfilled: bool) -> RedemptionRecord {
        RedemptionRecord {
            redemption_id: id,
            user: Address::repeat_byte(id as u8),
            item_id: 1,
            item_name: "CDA Hoodie".to_string(),
            cda_cost: U256::from(500u64),
            timestamp: 1_750_000_000 + id,
            fulfilled,
            shipping_info: "PO Box 7".to_string(),
        }
    }

    #[test]
    fn duplicate_events_apply_once() {
        let mut data = TrackingData::default();
        assert!(data.insert(record(1, false)));
        // At-least-once delivery replays the same event.
        assert!(!data.insert(record(1, false)));
        assert_eq!(data.records.len(), 1);
    }

    #[test]
    fn fulfillment_updates_existing_records_only() {
        let mut data = TrackingData::default();
        data.insert(record(1, false));
        assert!(data.set_fulfilled(1, true));
        assert!(data.records[0].fulfilled);
        assert!(!data.set_fulfilled(99, true));
    }

    #[test]
    fn state_round_trips_with_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let store = SwagStore::new(dir.path());
        assert_eq!(store.load().records.len(), 0);

        let mut data = TrackingData::default();
        data.insert(record(1, false));
        data.last_processed_block = 4242;
        store.save(&data).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.records, data.records);
        assert_eq!(loaded.last_processed_block, 4242);
    }
}

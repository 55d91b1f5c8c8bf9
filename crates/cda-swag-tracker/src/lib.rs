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

//! Swag redemption tracking. Chain events are consumed through a
//! cursor-based polling subscription: on every pass the tracker scans from
//! its persisted cursor to the chain head, applies events idempotently
//! (delivery is at-least-once; records are keyed by redemption id), then
//! advances the cursor. Read-side reporting covers burn totals, top items,
//! monthly trends, and overdue fulfillments.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy::{
    network::Ethereum,
    primitives::{utils::format_ether, U256},
    providers::Provider,
};
use cda_ledger::{
    errors::CodedError,
    impl_coded_debug,
    notify::{Notifier, Severity},
    reports::ReportWriter,
    schedule::month_key,
    CdaSwagService, LedgerError,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::{sync::Mutex, time::Duration};
use tokio_util::sync::CancellationToken;

pub mod store;

use store::{RedemptionRecord, SwagStore, TrackingData};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_OVERDUE_DAYS: u64 = 7;

const NOTIFY_SOURCE: &str = "CDA Swag Tracker";

#[derive(Error)]
pub enum TrackerError {
    #[error("{code} {0}", code = self.code())]
    Ledger(#[from] LedgerError),

    #[error("{code} persistence failed: {0:#}", code = self.code())]
    Persistence(anyhow::Error),

    #[error("{code} export failed: {0:#}", code = self.code())]
    Export(anyhow::Error),
}

impl_coded_debug!(TrackerError);

impl CodedError for TrackerError {
    fn code(&self) -> &str {
        match self {
            TrackerError::Ledger(_) => "[C-SWG-501]",
            TrackerError::Persistence(_) => "[C-SWG-502]",
            TrackerError::Export(_) => "[C-SWG-503]",
        }
    }
}

pub struct SwagTracker<P> {
    swag: CdaSwagService<P>,
    state: Mutex<TrackingData>,
    store: SwagStore,
    notifier: Notifier,
    reports: ReportWriter,
    poll_interval: Duration,
    start_block: Option<u64>,
    cancel: CancellationToken,
}

impl<P> SwagTracker<P>
where
    P: Provider<Ethereum> + 'static + Clone,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        swag: CdaSwagService<P>,
        store: SwagStore,
        notifier: Notifier,
        reports: ReportWriter,
        poll_interval: Duration,
        start_block: Option<u64>,
        cancel: CancellationToken,
    ) -> Self {
        let state = store.load();
        if !state.records.is_empty() {
            tracing::info!("Loaded {} existing redemption records", state.records.len());
        }
        Self {
            swag,
            state: Mutex::new(state),
            store,
            notifier,
            reports,
            poll_interval,
            start_block,
            cancel,
        }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Polls for redemption events until cancelled.
    pub async fn run(&self) -> Result<(), TrackerError> {
        tracing::info!("Starting swag burn tracking");
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(err) = self.poll_once().await {
                        tracing::error!("Event poll failed: {err}");
                    }
                }
                _ = self.cancel.cancelled() => {
                    tracing::info!("Swag burn tracking stopped");
                    return Ok(());
                }
            }
        }
    }

    /// One subscription pass: scan `[cursor, head]`, apply idempotently,
    /// advance the cursor. A crash before the cursor advances replays the
    /// range; the id-keyed dedupe absorbs the duplicates.
    pub async fn poll_once(&self) -> Result<(), TrackerError> {
        let head = self.swag.current_block().await?;
        let mut state = self.state.lock().await;

        if state.last_processed_block == 0 {
            // First run: start from the configured block, or the head when
            // historical redemptions are not of interest.
            state.last_processed_block = self.start_block.unwrap_or(head);
        }
        let from = state.last_processed_block;
        if head < from {
            return Ok(());
        }

        for event in self.swag.redeemed_events(from, head).await? {
            let redemption_id: u64 = event.redemptionId.saturating_to();
            if state.contains(redemption_id) {
                continue;
            }
            tracing::info!("New redemption detected: id {redemption_id}");
            match self.resolve_record(redemption_id, event.cdaCost).await {
                Ok(record) => {
                    self.notifier
                        .send(
                            Severity::Info,
                            "New Swag Redemption",
                            &format!(
                                "{} redeemed for {} CDA by {}",
                                record.item_name,
                                format_ether(record.cda_cost),
                                truncate_address(&record.user.to_string())
                            ),
                        )
                        .await;
                    state.insert(record);
                }
                Err(err) => {
                    // Leave the cursor untouched for this id; the next pass
                    // re-delivers the event.
                    tracing::error!("Failed to record redemption {redemption_id}: {err}");
                }
            }
        }

        for event in self.swag.fulfilled_events(from, head).await? {
            let redemption_id: u64 = event.redemptionId.saturating_to();
            if state.set_fulfilled(redemption_id, true) {
                tracing::info!("Redemption fulfilled: id {redemption_id}");
            }
        }

        state.last_processed_block = head + 1;
        state.last_updated = Utc::now().to_rfc3339();
        self.store.save(&state).map_err(TrackerError::Persistence)?;
        Ok(())
    }

    async fn resolve_record(
        &self,
        redemption_id: u64,
        cda_cost: U256,
    ) -> Result<RedemptionRecord, LedgerError> {
        let detail = self.swag.redemption(redemption_id).await?;
        let item = self.swag.swag_item(detail.item_id).await?;
        Ok(RedemptionRecord {
            redemption_id,
            user: detail.user,
            item_id: detail.item_id,
            item_name: item.name,
            cda_cost,
            timestamp: detail.timestamp,
            fulfilled: detail.fulfilled,
            shipping_info: detail.shipping_info,
        })
    }

    pub async fn stats(&self) -> RedemptionStats {
        let state = self.state.lock().await;
        redemption_stats(&state.records)
    }

    /// Writes the all-time burn report.
    pub async fn generate_burn_report(&self) -> Result<PathBuf, TrackerError> {
        let state = self.state.lock().await;
        let report = burn_report(&state.records, Utc::now());
        tracing::info!(
            "Total CDA burned: {}, fulfillment rate {}",
            report.summary.total_cda_burned,
            report.summary.fulfillment_rate
        );
        self.reports.write("swag-burn-report", &report).map_err(TrackerError::Export)
    }

    /// Exports all redemption rows to a timestamped CSV under `dir`.
    pub async fn export_csv(&self, dir: &Path) -> Result<PathBuf, TrackerError> {
        let state = self.state.lock().await;
        export_redemptions_csv(&state.records, dir).map_err(TrackerError::Export)
    }

    /// Unfulfilled redemptions older than the threshold, with a warning
    /// alert when any exist.
    pub async fn check_overdue_redemptions(
        &self,
        threshold_days: u64,
        now: DateTime<Utc>,
    ) -> Vec<RedemptionRecord> {
        let overdue: Vec<RedemptionRecord> = {
            let state = self.state.lock().await;
            overdue_redemptions(&state.records, threshold_days, now).into_iter().cloned().collect()
        };
        if !overdue.is_empty() {
            tracing::warn!(
                "Found {} overdue redemptions (>{threshold_days} days)",
                overdue.len()
            );
            self.notifier
                .send(
                    Severity::Warning,
                    "Overdue Redemptions Alert",
                    &format!(
                        "{} redemptions are overdue and need fulfillment.",
                        overdue.len()
                    ),
                )
                .await;
        }
        overdue
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemStat {
    pub item_name: String,
    pub count: usize,
    pub total_cda: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyStat {
    pub month: String,
    pub redemptions: usize,
    pub cda_burned: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedemptionStats {
    pub total_redemptions: usize,
    pub total_cda_burned: U256,
    pub fulfilled_redemptions: usize,
    pub pending_redemptions: usize,
    pub top_items: Vec<ItemStat>,
    pub monthly_stats: Vec<MonthlyStat>,
}

/// Aggregates the redemption log. Top items are ranked by count, capped at
/// ten; monthly trends are keyed `YYYY-MM` in ascending order.
pub fn redemption_stats(records: &[RedemptionRecord]) -> RedemptionStats {
    let total_cda_burned: U256 = records.iter().map(|r| r.cda_cost).sum();
    let fulfilled = records.iter().filter(|r| r.fulfilled).count();

    let mut items: BTreeMap<&str, (usize, U256)> = BTreeMap::new();
    for record in records {
        let entry = items.entry(&record.item_name).or_default();
        entry.0 += 1;
        entry.1 += record.cda_cost;
    }
    let mut top_items: Vec<ItemStat> = items
        .into_iter()
        .map(|(item_name, (count, total))| ItemStat {
            item_name: item_name.to_string(),
            count,
            total_cda: format_ether(total),
        })
        .collect();
    top_items.sort_by(|a, b| b.count.cmp(&a.count).then(a.item_name.cmp(&b.item_name)));
    top_items.truncate(10);

    let mut monthly: BTreeMap<String, (usize, U256)> = BTreeMap::new();
    for record in records {
        if let Some(at) = DateTime::<Utc>::from_timestamp(record.timestamp as i64, 0) {
            let entry = monthly.entry(month_key(at)).or_default();
            entry.0 += 1;
            entry.1 += record.cda_cost;
        }
    }
    let monthly_stats = monthly
        .into_iter()
        .map(|(month, (redemptions, burned))| MonthlyStat {
            month,
            redemptions,
            cda_burned: format_ether(burned),
        })
        .collect();

    RedemptionStats {
        total_redemptions: records.len(),
        total_cda_burned,
        fulfilled_redemptions: fulfilled,
        pending_redemptions: records.len() - fulfilled,
        top_items,
        monthly_stats,
    }
}

#[derive(Debug, Serialize)]
pub struct BurnSummary {
    pub total_redemptions: usize,
    pub total_cda_burned: String,
    pub average_cda_per_redemption: String,
    pub fulfillment_rate: String,
    pub pending_fulfillments: usize,
}

#[derive(Debug, Serialize)]
pub struct RecentRedemption {
    pub date: String,
    pub user: String,
    pub item: String,
    pub cost: String,
    pub fulfilled: bool,
}

#[derive(Debug, Serialize)]
pub struct BurnReport {
    pub generated_at: String,
    pub report_period: String,
    pub summary: BurnSummary,
    pub top_items: Vec<ItemStat>,
    pub monthly_trends: Vec<MonthlyStat>,
    pub recent_redemptions: Vec<RecentRedemption>,
}

pub fn burn_report(records: &[RedemptionRecord], now: DateTime<Utc>) -> BurnReport {
    let stats = redemption_stats(records);
    let average = if stats.total_redemptions == 0 {
        U256::ZERO
    } else {
        stats.total_cda_burned / U256::from(stats.total_redemptions as u64)
    };
    let fulfillment_bps = if stats.total_redemptions == 0 {
        0
    } else {
        stats.fulfilled_redemptions * 10_000 / stats.total_redemptions
    };

    let mut recent: Vec<&RedemptionRecord> = records.iter().collect();
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let recent_redemptions = recent
        .into_iter()
        .take(20)
        .map(|record| RecentRedemption {
            date: DateTime::<Utc>::from_timestamp(record.timestamp as i64, 0)
                .map(|at| at.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            user: truncate_address(&record.user.to_string()),
            item: record.item_name.clone(),
            cost: format_ether(record.cda_cost),
            fulfilled: record.fulfilled,
        })
        .collect();

    BurnReport {
        generated_at: now.to_rfc3339(),
        report_period: "All time".to_string(),
        summary: BurnSummary {
            total_redemptions: stats.total_redemptions,
            total_cda_burned: format_ether(stats.total_cda_burned),
            average_cda_per_redemption: format_ether(average),
            fulfillment_rate: format!("{:.2}%", fulfillment_bps as f64 / 100.0),
            pending_fulfillments: stats.pending_redemptions,
        },
        top_items: stats.top_items,
        monthly_trends: stats.monthly_stats,
        recent_redemptions,
    }
}

/// Unfulfilled records older than `threshold_days` relative to `now`.
pub fn overdue_redemptions(
    records: &[RedemptionRecord],
    threshold_days: u64,
    now: DateTime<Utc>,
) -> Vec<&RedemptionRecord> {
    let cutoff = (now.timestamp().max(0) as u64).saturating_sub(threshold_days * 86_400);
    records.iter().filter(|r| !r.fulfilled && r.timestamp < cutoff).collect()
}

/// Writes redemption rows to `<dir>/swag-redemptions-<unix_millis>.csv`.
pub fn export_redemptions_csv(records: &[RedemptionRecord], dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "swag-redemptions-{}.csv",
        Utc::now().timestamp_millis().max(0)
    ));
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record([
        "redemption_id",
        "user",
        "item_name",
        "cda_cost",
        "date",
        "fulfilled",
        "shipping_info",
    ])?;
    for record in records {
        writer.write_record([
            record.redemption_id.to_string(),
            record.user.to_string(),
            record.item_name.clone(),
            format_ether(record.cda_cost),
            DateTime::<Utc>::from_timestamp(record.timestamp as i64, 0)
                .map(|at| at.to_rfc3339())
                .unwrap_or_default(),
            record.fulfilled.to_string(),
            record.shipping_info.clone(),
        ])?;
    }
    writer.flush()?;
    tracing::info!("CSV exported to {}", path.display());
    Ok(path)
}

fn truncate_address(address: &str) -> String {
    if address.len() <= 10 {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

#[cfg(test)]
mod tests {
    use alloy::primitives::Address;
    use cda_ledger::category::to_wei;
    use chrono::TimeZone;

    use super::*;

    fn record(id: u64, item: &str, cost: u64, timestamp: u64, fulfilled: bool) -> RedemptionRecord {
        RedemptionRecord {
            redemption_id: id,
            user: Address::repeat_byte(id as u8),
            item_id: 1,
            item_name: item.to_string(),
            cda_cost: to_wei(cost),
            timestamp,
            fulfilled,
            shipping_info: String::new(),
        }
    }

    fn july(day: u32) -> u64 {
        Utc.with_ymd_and_hms(2026, 7, day, 12, 0, 0).unwrap().timestamp() as u64
    }

    #[test]
    fn stats_aggregate_totals_and_top_items() {
        let records = vec![
            record(1, "CDA Hoodie", 500, july(1), true),
            record(2, "CDA Hoodie", 500, july(2), false),
            record(3, "Sticker Pack", 50, july(3), true),
        ];
        let stats = redemption_stats(&records);

        assert_eq!(stats.total_redemptions, 3);
        assert_eq!(stats.total_cda_burned, to_wei(1050));
        assert_eq!(stats.fulfilled_redemptions, 2);
        assert_eq!(stats.pending_redemptions, 1);
        assert_eq!(stats.top_items[0].item_name, "CDA Hoodie");
        assert_eq!(stats.top_items[0].count, 2);
        assert_eq!(stats.monthly_stats.len(), 1);
        assert_eq!(stats.monthly_stats[0].month, "2026-07");
        assert_eq!(stats.monthly_stats[0].redemptions, 3);
    }

    #[test]
    fn burn_report_summary_math() {
        let records = vec![
            record(1, "CDA Hoodie", 500, july(1), true),
            record(2, "Sticker Pack", 100, july(2), false),
        ];
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();
        let report = burn_report(&records, now);

        assert_eq!(report.summary.total_cda_burned, "600.000000000000000000");
        assert_eq!(report.summary.average_cda_per_redemption, "300.000000000000000000");
        assert_eq!(report.summary.fulfillment_rate, "50.00%");
        assert_eq!(report.summary.pending_fulfillments, 1);
        assert_eq!(report.recent_redemptions.len(), 2);
        // Most recent first, with a truncated user address.
        assert_eq!(report.recent_redemptions[0].item, "Sticker Pack");
        assert!(report.recent_redemptions[0].user.contains("..."));
    }

    #[test]
    fn empty_log_produces_zeroed_report() {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();
        let report = burn_report(&[], now);
        assert_eq!(report.summary.total_redemptions, 0);
        assert_eq!(report.summary.fulfillment_rate, "0.00%");
    }

    #[test]
    fn overdue_requires_age_and_unfulfilled() {
        let now = Utc.with_ymd_and_hms(2026, 7, 20, 12, 0, 0).unwrap();
        let records = vec![
            record(1, "CDA Hoodie", 500, july(1), false),  // 19 days old, pending
            record(2, "CDA Hoodie", 500, july(1), true),   // old but fulfilled
            record(3, "Sticker Pack", 50, july(18), false), // recent, pending
        ];
        let overdue = overdue_redemptions(&records, 7, now);
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].redemption_id, 1);
    }

    #[test]
    fn csv_export_writes_one_row_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let records =
            vec![record(1, "CDA Hoodie", 500, july(1), true), record(2, "Mug", 75, july(2), false)];
        let path = export_redemptions_csv(&records, dir.path()).unwrap();

        let raw = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = raw.trim().lines().collect();
        assert_eq!(lines.len(), 3, "header plus two rows");
        assert!(lines[0].starts_with("redemption_id,user,item_name"));
        assert!(lines[1].contains("CDA Hoodie"));
        assert!(lines[2].contains("Mug"));
    }

    #[test]
    fn address_truncation() {
        assert_eq!(
            truncate_address("0x1111111111111111111111111111111111111111"),
            "0x1111...1111"
        );
        assert_eq!(truncate_address("short"), "short");
    }
}

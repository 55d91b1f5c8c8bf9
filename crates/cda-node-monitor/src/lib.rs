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

//! Node uptime monitoring and monthly reward apportionment.
//!
//! The monitor polls the fleet on a fixed interval, keeps a rolling 30-day
//! history per node, and once the calendar rolls past the 1st apportions the
//! previous month's reward pool across qualifying nodes proportional to
//! uptime. Persisted `distributed` flags make the monthly pass idempotent:
//! a partially-paid month re-attempts only the unpaid records.

use alloy::primitives::{utils::format_ether, U256};
use cda_ledger::{
    apportion::{apply_basis_points, share_basis_points},
    errors::CodedError,
    impl_coded_debug,
    reports::ReportWriter,
    schedule::{month_key, now_secs, previous_month_window},
    Category, LedgerError, TokenLedgerObj,
};
use chrono::{DateTime, Datelike, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio::{sync::Mutex, time::Duration};
use tokio_util::sync::CancellationToken;

pub mod health;
pub mod registry;
pub mod store;
pub mod uptime;

use health::HealthChecker;
use registry::{NodeInfo, NodeRegistry};
use store::{DataStore, MonthlyReward, RewardLedger, UptimeSnapshot};
use uptime::{prune_cutoff, uptime_percentage, SECS_PER_DAY};

/// Default fleet polling cadence.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Cadence of the monthly-boundary check.
const MONTHLY_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// Minimum uptime percentage a node must reach over the month to qualify.
pub const MIN_REWARD_UPTIME_PCT: f64 = 80.0;
/// The month's pool is one twelfth of the remaining node allocation.
const MONTHLY_POOL_DIVISOR: u64 = 12;

#[derive(Error)]
pub enum MonitorError {
    #[error("{code} {0}", code = self.code())]
    Ledger(#[from] LedgerError),
}

impl_coded_debug!(MonitorError);

impl CodedError for MonitorError {
    fn code(&self) -> &str {
        match self {
            MonitorError::Ledger(_) => "[C-MON-301]",
        }
    }
}

pub struct UptimeMonitor {
    registry: Mutex<NodeRegistry>,
    rewards: Mutex<RewardLedger>,
    checker: HealthChecker,
    token: TokenLedgerObj,
    store: DataStore,
    reports: ReportWriter,
    check_interval: Duration,
    cancel: CancellationToken,
}

impl UptimeMonitor {
    /// Builds the monitor, restoring persisted uptime history and reward
    /// records for the configured fleet.
    pub fn new(
        mut registry: NodeRegistry,
        token: TokenLedgerObj,
        store: DataStore,
        reports: ReportWriter,
        check_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        if let Some(snapshot) = store.load_uptime() {
            registry.restore_history(snapshot.nodes);
            tracing::info!("Restored uptime history from disk");
        }
        let rewards = store.load_rewards();
        if !rewards.monthly_rewards.is_empty() {
            tracing::info!("Loaded {} reward records", rewards.monthly_rewards.len());
        }
        Self {
            registry: Mutex::new(registry),
            rewards: Mutex::new(rewards),
            checker: HealthChecker::new(),
            token,
            store,
            reports,
            check_interval,
            cancel,
        }
    }

    /// Requests a graceful stop: in-flight work completes, no further
    /// interval firings are scheduled.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Runs the monitoring session until cancelled. Interval callbacks never
    /// overlap: a check still running when the next tick arrives causes that
    /// tick to be skipped.
    pub async fn run(&self) -> Result<(), MonitorError> {
        {
            let registry = self.registry.lock().await;
            tracing::info!("Starting node uptime monitoring ({} nodes)", registry.len());
        }

        let mut check = tokio::time::interval(self.check_interval);
        check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut monthly = tokio::time::interval(MONTHLY_CHECK_INTERVAL);
        monthly.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = check.tick() => {
                    self.check_all_nodes().await;
                }
                _ = monthly.tick() => {
                    let now = Utc::now();
                    if now.day() == 1 {
                        if let Err(err) = self.distribute_monthly_rewards(now).await {
                            tracing::error!("Monthly reward distribution failed: {err}");
                        }
                    }
                }
                _ = self.cancel.cancelled() => {
                    tracing::info!("Node monitoring stopped");
                    return Ok(());
                }
            }
        }
    }

    /// Fans out health checks across the fleet concurrently. Each probe is
    /// isolated: one slow or failing node never blocks the others. One
    /// snapshot is persisted per pass, after pruning.
    pub async fn check_all_nodes(&self) {
        let targets: Vec<(String, String, url::Url)> = {
            let registry = self.registry.lock().await;
            registry
                .iter()
                .map(|node| (node.address.clone(), node.name.clone(), node.endpoint.clone()))
                .collect()
        };
        tracing::debug!("Checking uptime of {} nodes", targets.len());

        let probes = targets.iter().map(|(address, name, endpoint)| {
            let checker = self.checker.clone();
            async move {
                let record = checker.probe(endpoint).await;
                (address.clone(), name.clone(), record)
            }
        });
        let outcomes = join_all(probes).await;

        let now = now_secs();
        let mut registry = self.registry.lock().await;
        for (address, name, record) in outcomes {
            if record.online {
                tracing::info!(
                    "{name}: online (block {:?}, {}ms, synced {:?})",
                    record.block_height,
                    record.response_time_ms.unwrap_or(0),
                    record.synced
                );
            } else {
                tracing::warn!("{name}: offline");
            }
            if let Some(node) = registry.get_mut(&address) {
                node.push_record(record);
                node.prune_before(prune_cutoff(now));
            }
        }

        let snapshot =
            UptimeSnapshot { last_updated: Utc::now().to_rfc3339(), nodes: registry.snapshot() };
        if let Err(err) = self.store.save_uptime(&snapshot) {
            tracing::error!("Failed to persist uptime snapshot: {err:#}");
        }
    }

    /// Apportions the previous calendar month's pool across qualifying
    /// nodes. Shares are computed from one history snapshot so every share
    /// sees the same denominator. Already-distributed records are skipped;
    /// a failure for one node leaves its record unflipped for the next run.
    pub async fn distribute_monthly_rewards(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(), MonitorError> {
        let (start, end) = previous_month_window(now);
        let month = month_key(start);

        let snapshot: Vec<NodeInfo> = self.registry.lock().await.snapshot();
        let mut rewards = self.rewards.lock().await;

        if rewards.month_complete(&month) {
            tracing::info!("Rewards for {month} already distributed");
            return Ok(());
        }

        struct Candidate {
            node_address: String,
            name: String,
            operator: alloy::primitives::Address,
            pct: f64,
        }

        let mut candidates = Vec::new();
        for node in &snapshot {
            let pct = uptime_percentage(
                &node.uptime_history,
                start.timestamp().max(0) as u64,
                end.timestamp().max(0) as u64,
            );
            if pct >= MIN_REWARD_UPTIME_PCT {
                candidates.push(Candidate {
                    node_address: node.address.clone(),
                    name: node.name.clone(),
                    operator: node.operator_address,
                    pct,
                });
            } else {
                tracing::warn!("{} below minimum uptime for {month}: {pct:.2}%", node.name);
            }
        }

        if candidates.is_empty() {
            tracing::warn!("No nodes qualify for rewards in {month}");
            return Ok(());
        }

        let allocation = self.token.remaining_allocation(Category::Node).await?;
        let pool = allocation / U256::from(MONTHLY_POOL_DIVISOR);
        let total: f64 = candidates.iter().map(|c| c.pct).sum();
        tracing::info!("Monthly reward pool for {month}: {} CDA", format_ether(pool));

        for candidate in &candidates {
            if rewards.find(&month, &candidate.node_address).is_none() {
                rewards.monthly_rewards.push(MonthlyReward {
                    month: month.clone(),
                    node_address: candidate.node_address.clone(),
                    operator_address: candidate.operator,
                    uptime_percentage: candidate.pct,
                    reward_amount: U256::ZERO,
                    distributed: false,
                });
            }
        }

        for candidate in &candidates {
            let already_paid = rewards
                .find(&month, &candidate.node_address)
                .map(|record| record.distributed)
                .unwrap_or(false);
            if already_paid {
                continue;
            }

            let amount = apply_basis_points(pool, share_basis_points(candidate.pct, total));
            let reason = format!(
                "Node operator reward - {:.2}% uptime for {month}",
                candidate.pct
            );
            match self.token.distribute_reward(candidate.operator, amount, &reason, Category::Node).await
            {
                Ok(()) => {
                    if let Some(record) = rewards.find_mut(&month, &candidate.node_address) {
                        record.uptime_percentage = candidate.pct;
                        record.reward_amount = amount;
                        record.distributed = true;
                    }
                    rewards.last_updated = Utc::now().to_rfc3339();
                    // Persist the flip immediately so a crash cannot replay
                    // an already-paid record.
                    if let Err(err) = self.store.save_rewards(&rewards) {
                        tracing::error!("Failed to persist reward ledger: {err:#}");
                    }
                    tracing::info!(
                        "Rewarded {} ({}): {} CDA ({:.2}% uptime)",
                        candidate.name,
                        candidate.operator,
                        format_ether(amount),
                        candidate.pct
                    );
                }
                Err(err) => {
                    tracing::error!(
                        "Failed to distribute {month} reward to {} (operator {}, amount {amount}): {err}",
                        candidate.name,
                        candidate.operator
                    );
                }
            }
        }

        let month_records: Vec<MonthlyReward> = rewards.month_records(&month).cloned().collect();
        drop(rewards);
        self.generate_monthly_report(&month, &month_records, &snapshot);
        Ok(())
    }

    /// Writes the month's uptime/reward report. Audit side-effect only.
    fn generate_monthly_report(
        &self,
        month: &str,
        records: &[MonthlyReward],
        snapshot: &[NodeInfo],
    ) {
        let total_rewards: U256 = records
            .iter()
            .filter(|r| r.distributed)
            .map(|r| r.reward_amount)
            .sum();
        let average_uptime = if records.is_empty() {
            0.0
        } else {
            records.iter().map(|r| r.uptime_percentage).sum::<f64>() / records.len() as f64
        };

        let node_performance: Vec<NodePerformance> = records
            .iter()
            .map(|record| {
                let name = snapshot
                    .iter()
                    .find(|node| node.address == record.node_address)
                    .map(|node| node.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string());
                NodePerformance {
                    node_name: name,
                    operator_address: record.operator_address.to_string(),
                    uptime_percentage: format!("{:.2}%", record.uptime_percentage),
                    reward_amount: format_ether(record.reward_amount),
                    status: if record.distributed { "Distributed" } else { "Pending" }.to_string(),
                }
            })
            .collect();

        let ineligible_nodes: Vec<IneligibleNode> = snapshot
            .iter()
            .filter(|node| !records.iter().any(|r| r.node_address == node.address))
            .map(|node| IneligibleNode {
                node_name: node.name.clone(),
                operator_address: node.operator_address.to_string(),
                reason: format!("Below {MIN_REWARD_UPTIME_PCT}% uptime threshold"),
            })
            .collect();

        let report = MonthlyReport {
            month: month.to_string(),
            generated_at: Utc::now().to_rfc3339(),
            summary: MonthlySummary {
                total_nodes_eligible: records.len(),
                total_nodes_monitored: snapshot.len(),
                total_rewards_distributed: format_ether(total_rewards),
                average_uptime: format!("{average_uptime:.2}%"),
                eligibility_threshold: format!("{MIN_REWARD_UPTIME_PCT}%"),
            },
            node_performance,
            ineligible_nodes,
        };

        if let Err(err) = self.reports.write(&format!("node-uptime-{month}"), &report) {
            tracing::error!("Failed to write monthly report for {month}: {err:#}");
        }
    }

    /// Read-side aggregation over the current history. No ledger access.
    pub async fn uptime_stats(&self, now: DateTime<Utc>) -> UptimeStats {
        let now_ts = now.timestamp().max(0) as u64;
        let registry = self.registry.lock().await;

        let nodes: Vec<NodeStats> = registry
            .iter()
            .map(|node| {
                let window = |days: u64| {
                    uptime_percentage(
                        &node.uptime_history,
                        now_ts.saturating_sub(days * SECS_PER_DAY),
                        now_ts,
                    )
                };
                NodeStats {
                    name: node.name.clone(),
                    address: node.address.clone(),
                    online: node.latest().map(|r| r.online).unwrap_or(false),
                    uptime_24h: window(1),
                    uptime_7d: window(7),
                    uptime_30d: window(30),
                    last_checked: node.last_checked,
                }
            })
            .collect();

        let average = |extract: fn(&NodeStats) -> f64| {
            if nodes.is_empty() {
                0.0
            } else {
                nodes.iter().map(extract).sum::<f64>() / nodes.len() as f64
            }
        };
        let overall = FleetStats {
            total_nodes: nodes.len(),
            online_nodes: nodes.iter().filter(|n| n.online).count(),
            average_uptime_24h: average(|n| n.uptime_24h),
            average_uptime_7d: average(|n| n.uptime_7d),
            average_uptime_30d: average(|n| n.uptime_30d),
        };

        UptimeStats { nodes, overall }
    }

    pub async fn status(&self) -> MonitorStatus {
        let registry = self.registry.lock().await;
        let rewards = self.rewards.lock().await;
        MonitorStatus {
            total_nodes: registry.len(),
            last_check: registry.last_checked(),
            total_rewards_distributed: format_ether(rewards.total_distributed()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeStats {
    pub name: String,
    pub address: String,
    pub online: bool,
    pub uptime_24h: f64,
    pub uptime_7d: f64,
    pub uptime_30d: f64,
    pub last_checked: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FleetStats {
    pub total_nodes: usize,
    pub online_nodes: usize,
    pub average_uptime_24h: f64,
    pub average_uptime_7d: f64,
    pub average_uptime_30d: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UptimeStats {
    pub nodes: Vec<NodeStats>,
    pub overall: FleetStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub total_nodes: usize,
    pub last_check: u64,
    pub total_rewards_distributed: String,
}

#[derive(Debug, Serialize)]
struct MonthlySummary {
    total_nodes_eligible: usize,
    total_nodes_monitored: usize,
    total_rewards_distributed: String,
    average_uptime: String,
    eligibility_threshold: String,
}

#[derive(Debug, Serialize)]
struct NodePerformance {
    node_name: String,
    operator_address: String,
    uptime_percentage: String,
    reward_amount: String,
    status: String,
}

#[derive(Debug, Serialize)]
struct IneligibleNode {
    node_name: String,
    operator_address: String,
    reason: String,
}

#[derive(Debug, Serialize)]
struct MonthlyReport {
    month: String,
    generated_at: String,
    summary: MonthlySummary,
    node_performance: Vec<NodePerformance>,
    ineligible_nodes: Vec<IneligibleNode>,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy::primitives::Address;
    use cda_ledger::{category::to_wei, test_utils::TestLedger, CategoryCaps};
    use chrono::TimeZone;
    use tempfile::tempdir;

    use super::*;
    use crate::registry::UptimeRecord;

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    /// A node with `online_days` online and `30 - online_days` offline daily
    /// checks across July 2026.
    fn node_with_july_history(address: &str, operator: u8, online_days: u64) -> NodeInfo {
        let start = utc(2026, 7, 1, 0).timestamp() as u64;
        let mut node = NodeInfo {
            address: address.to_string(),
            name: format!("CDA {address}"),
            endpoint: "http://node.cda.local:8545".parse().unwrap(),
            operator_address: Address::repeat_byte(operator),
            last_checked: 0,
            uptime_history: vec![],
        };
        for day in 0..30 {
            node.push_record(UptimeRecord {
                timestamp: start + day * SECS_PER_DAY + 1800,
                online: day < online_days,
                block_height: None,
                response_time_ms: None,
                synced: None,
            });
        }
        node
    }

    fn monitor_with(
        nodes: Vec<NodeInfo>,
        ledger: Arc<TestLedger>,
        dir: &std::path::Path,
    ) -> UptimeMonitor {
        UptimeMonitor::new(
            NodeRegistry::new(nodes),
            ledger,
            DataStore::new(&dir.join("data")),
            ReportWriter::new(dir.join("reports")),
            DEFAULT_CHECK_INTERVAL,
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn qualification_threshold_is_80_percent() {
        let ledger = Arc::new(TestLedger::new(CategoryCaps::default()));
        let dir = tempdir().unwrap();
        // Node A: 27/30 online (90%). Node B: 20/30 online (66.7%).
        let monitor = monitor_with(
            vec![
                node_with_july_history("node-a", 1, 27),
                node_with_july_history("node-b", 2, 20),
            ],
            ledger.clone(),
            dir.path(),
        );

        monitor.distribute_monthly_rewards(utc(2026, 8, 1, 1)).await.unwrap();

        let pool = CategoryCaps::default().cap_wei(Category::Node) / U256::from(12u64);
        // Sole qualifier takes the whole monthly pool.
        assert_eq!(ledger.balance(Address::repeat_byte(1)), pool);
        // Below-threshold node is excluded entirely and paid nothing.
        assert_eq!(ledger.balance(Address::repeat_byte(2)), U256::ZERO);
    }

    #[tokio::test]
    async fn shares_are_proportional_and_bounded_by_the_pool() {
        let ledger = Arc::new(TestLedger::new(CategoryCaps::default()));
        let dir = tempdir().unwrap();
        let monitor = monitor_with(
            vec![
                node_with_july_history("node-a", 1, 27), // 90%
                node_with_july_history("node-b", 2, 26), // 86.7%
                node_with_july_history("node-c", 3, 24), // 80%
            ],
            ledger.clone(),
            dir.path(),
        );

        monitor.distribute_monthly_rewards(utc(2026, 8, 1, 1)).await.unwrap();

        let a = ledger.balance(Address::repeat_byte(1));
        let b = ledger.balance(Address::repeat_byte(2));
        let c = ledger.balance(Address::repeat_byte(3));
        assert!(a > b && b > c, "rewards must increase with uptime");

        let pool = CategoryCaps::default().cap_wei(Category::Node) / U256::from(12u64);
        assert!(a + b + c <= pool, "rounding must never over-pay the pool");
    }

    #[tokio::test]
    async fn second_run_without_new_data_pays_nothing() {
        let ledger = Arc::new(TestLedger::new(CategoryCaps::default()));
        let dir = tempdir().unwrap();
        let monitor = monitor_with(
            vec![node_with_july_history("node-a", 1, 30)],
            ledger.clone(),
            dir.path(),
        );

        monitor.distribute_monthly_rewards(utc(2026, 8, 1, 1)).await.unwrap();
        let calls_after_first = ledger.calls().len();
        let paid_after_first = ledger.balance(Address::repeat_byte(1));

        monitor.distribute_monthly_rewards(utc(2026, 8, 1, 2)).await.unwrap();

        assert_eq!(ledger.calls().len(), calls_after_first, "no duplicate payouts");
        assert_eq!(ledger.balance(Address::repeat_byte(1)), paid_after_first);
    }

    #[tokio::test]
    async fn partial_failure_reattempts_only_unpaid_records() {
        let ledger = Arc::new(TestLedger::new(CategoryCaps::default()));
        let dir = tempdir().unwrap();
        let monitor = monitor_with(
            vec![
                node_with_july_history("node-a", 1, 30),
                node_with_july_history("node-b", 2, 29),
            ],
            ledger.clone(),
            dir.path(),
        );

        // First run: node B's operator fails at the transport layer.
        ledger.fail_distributions_to(Address::repeat_byte(2));
        monitor.distribute_monthly_rewards(utc(2026, 8, 1, 1)).await.unwrap();
        let a_paid = ledger.balance(Address::repeat_byte(1));
        assert!(a_paid > U256::ZERO);
        assert_eq!(ledger.balance(Address::repeat_byte(2)), U256::ZERO);

        // Second run: only B's unflipped record is attempted.
        ledger.clear_failures();
        monitor.distribute_monthly_rewards(utc(2026, 8, 1, 2)).await.unwrap();

        assert_eq!(ledger.balance(Address::repeat_byte(1)), a_paid, "A must not be re-paid");
        assert!(ledger.balance(Address::repeat_byte(2)) > U256::ZERO, "B must be paid on retry");
    }

    #[tokio::test]
    async fn reward_state_survives_restart() {
        let ledger = Arc::new(TestLedger::new(CategoryCaps::default()));
        let dir = tempdir().unwrap();
        {
            let monitor = monitor_with(
                vec![node_with_july_history("node-a", 1, 30)],
                ledger.clone(),
                dir.path(),
            );
            monitor.distribute_monthly_rewards(utc(2026, 8, 1, 1)).await.unwrap();
        }
        let calls = ledger.calls().len();

        // A fresh monitor instance over the same data dir sees the persisted
        // flags and pays nothing again.
        let monitor = monitor_with(
            vec![node_with_july_history("node-a", 1, 30)],
            ledger.clone(),
            dir.path(),
        );
        monitor.distribute_monthly_rewards(utc(2026, 8, 1, 3)).await.unwrap();
        assert_eq!(ledger.calls().len(), calls);
    }

    #[tokio::test]
    async fn no_qualifiers_touches_no_ledger_state() {
        let ledger = Arc::new(TestLedger::new(CategoryCaps::default()));
        let dir = tempdir().unwrap();
        let monitor = monitor_with(
            vec![node_with_july_history("node-a", 1, 10)],
            ledger.clone(),
            dir.path(),
        );

        monitor.distribute_monthly_rewards(utc(2026, 8, 1, 1)).await.unwrap();
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn stats_cover_trailing_windows() {
        let ledger = Arc::new(TestLedger::new(CategoryCaps::default()));
        let dir = tempdir().unwrap();
        let monitor = monitor_with(
            vec![node_with_july_history("node-a", 1, 30)],
            ledger.clone(),
            dir.path(),
        );

        let stats = monitor.uptime_stats(utc(2026, 7, 31, 12)).await;
        assert_eq!(stats.overall.total_nodes, 1);
        assert_eq!(stats.nodes[0].uptime_30d, 100.0);
        assert!(stats.nodes[0].online);
    }
}

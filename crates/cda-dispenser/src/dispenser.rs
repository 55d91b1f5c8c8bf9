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

use std::{collections::BTreeMap, path::PathBuf};

use alloy::primitives::{
    utils::format_ether,
    Address, U256,
};
use cda_ledger::{
    apportion::{apply_basis_points, share_basis_points, utilization_basis_points},
    errors::CodedError,
    impl_coded_debug,
    reports::ReportWriter,
    retry::{self, with_backoff},
    BadgeLedgerObj, Category, CategoryCaps, LedgerError, TokenLedgerObj,
};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::activity::{ActivityRecord, ActivityType, HackathonWinner, NodeRunnerUptime, RewardSchedule};

/// Minimum uptime fraction a runner must hold to qualify for node rewards.
pub const MIN_RUNNER_UPTIME: f64 = 0.8;

#[derive(Error)]
pub enum DispenserError {
    /// The whole batch for one activity type failed; the underlying call is
    /// all-or-nothing, so no recipient in it was paid. Operators re-run with
    /// a corrected list rather than the dispenser retrying per recipient.
    #[error("{code} batch distribution failed for `{activity}` ({recipients} recipients): {source}", code = self.code())]
    BatchFailed {
        activity: ActivityType,
        recipients: usize,
        #[source]
        source: LedgerError,
    },

    #[error("{code} reward amount must be positive", code = self.code())]
    InvalidAmount,

    #[error("{code} activity batch is empty", code = self.code())]
    EmptyBatch,

    #[error("{code} {0}", code = self.code())]
    Ledger(#[from] LedgerError),

    #[error("{code} failed to write report: {0:#}", code = self.code())]
    Report(anyhow::Error),
}

impl_coded_debug!(DispenserError);

impl CodedError for DispenserError {
    fn code(&self) -> &str {
        match self {
            DispenserError::BatchFailed { .. } => "[C-DSP-201]",
            DispenserError::InvalidAmount => "[C-DSP-202]",
            DispenserError::EmptyBatch => "[C-DSP-203]",
            DispenserError::Ledger(_) => "[C-DSP-204]",
            DispenserError::Report(_) => "[C-DSP-205]",
        }
    }
}

/// Converts activity records into on-chain distributions without exceeding
/// category allocations, recording badge progression alongside.
pub struct RewardDispenser {
    token: TokenLedgerObj,
    badge: BadgeLedgerObj,
    schedule: RewardSchedule,
    caps: CategoryCaps,
    reports: ReportWriter,
}

impl RewardDispenser {
    pub fn new(
        token: TokenLedgerObj,
        badge: BadgeLedgerObj,
        schedule: RewardSchedule,
        caps: CategoryCaps,
        reports: ReportWriter,
    ) -> Self {
        Self { token, badge, schedule, caps, reports }
    }

    pub fn schedule(&self) -> &RewardSchedule {
        &self.schedule
    }

    /// Distributes a batch of activity records, grouped per activity type
    /// into one all-or-nothing batched call plus one badge counter update.
    pub async fn process_activity_batch(
        &self,
        records: &[ActivityRecord],
    ) -> Result<(), DispenserError> {
        if records.is_empty() {
            return Err(DispenserError::EmptyBatch);
        }

        tracing::info!("Distributing rewards to {} recipients", records.len());

        let mut groups: BTreeMap<ActivityType, Vec<&ActivityRecord>> = BTreeMap::new();
        for record in records {
            groups.entry(record.activity).or_default().push(record);
        }

        for (activity, group) in groups {
            self.distribute_activity_group(activity, &group).await?;
        }
        Ok(())
    }

    async fn distribute_activity_group(
        &self,
        activity: ActivityType,
        group: &[&ActivityRecord],
    ) -> Result<(), DispenserError> {
        let recipients: Vec<Address> = group.iter().map(|r| r.recipient).collect();
        let amounts: Vec<U256> = group.iter().map(|r| r.reward).collect();
        let reason = format!("{activity} participation - {}", Utc::now().to_rfc3339());
        let category = activity.category();

        with_backoff(retry::DEFAULT_ATTEMPTS, retry::DEFAULT_DELAY, || {
            self.token.batch_distribute_rewards(&recipients, &amounts, &reason, category)
        })
        .await
        .map_err(|source| {
            tracing::error!(
                "Batch for `{activity}` failed ({} recipients, category {category}, reason `{reason}`): {source}",
                recipients.len()
            );
            DispenserError::BatchFailed { activity, recipients: recipients.len(), source }
        })?;
        tracing::info!("Distributed `{activity}` rewards to {} recipients", recipients.len());

        let counts = vec![1u64; recipients.len()];
        self.badge.batch_record_activity(&recipients, activity.as_str(), &counts).await?;
        tracing::info!("Recorded `{activity}` progression for {} badges", recipients.len());
        Ok(())
    }

    /// Single manual distribution for out-of-band awards. A category
    /// exhaustion propagates as-is and is never retried.
    pub async fn distribute_special_reward(
        &self,
        to: Address,
        amount: U256,
        reason: &str,
        category: Category,
    ) -> Result<(), DispenserError> {
        if amount.is_zero() {
            return Err(DispenserError::InvalidAmount);
        }
        tracing::info!("Distributing special reward of {} CDA to {to}", format_ether(amount));

        with_backoff(retry::DEFAULT_ATTEMPTS, retry::DEFAULT_DELAY, || {
            self.token.distribute_reward(to, amount, reason, category)
        })
        .await
        .map_err(|err| {
            tracing::error!(
                "Special reward failed (recipient {to}, amount {amount}, category {category}, reason `{reason}`): {err}"
            );
            DispenserError::from(err)
        })
    }

    /// Placement-tiered hackathon payouts, each with a project badge credit.
    pub async fn distribute_hackathon_rewards(
        &self,
        winners: &[HackathonWinner],
    ) -> Result<(), DispenserError> {
        tracing::info!("Distributing hackathon rewards to {} winners", winners.len());

        for winner in winners {
            let tokens = match winner.place {
                1 => 1000,
                2 => 750,
                3 => 500,
                _ => 250,
            };
            let reason = format!("Hackathon {} place winner", ordinal(winner.place));
            self.distribute_special_reward(
                winner.address,
                cda_ledger::category::to_wei(tokens),
                &reason,
                Category::Milestone,
            )
            .await?;
            self.badge.record_activity(winner.address, ActivityType::Project.as_str(), 1).await?;
        }
        Ok(())
    }

    /// Splits the remaining `node` allocation across qualifying runners,
    /// proportional to uptime among qualifiers only. Returns the payouts
    /// made. Residual basis points from flooring stay in the allocation.
    pub async fn distribute_node_runner_rewards(
        &self,
        runners: &[NodeRunnerUptime],
    ) -> Result<Vec<(Address, U256)>, DispenserError> {
        let (qualifying, skipped): (Vec<_>, Vec<_>) =
            runners.iter().partition(|r| r.uptime >= MIN_RUNNER_UPTIME);
        for runner in &skipped {
            tracing::warn!(
                "Skipping {} - uptime too low: {:.1}%",
                runner.name,
                runner.uptime * 100.0
            );
        }
        if qualifying.is_empty() {
            tracing::warn!("No node runners qualify for rewards");
            return Ok(vec![]);
        }

        let pool = self.token.remaining_allocation(Category::Node).await?;
        let total: f64 = qualifying.iter().map(|r| r.uptime).sum();
        let mut paid = Vec::with_capacity(qualifying.len());

        for runner in &qualifying {
            let amount = apply_basis_points(pool, share_basis_points(runner.uptime, total));
            if amount.is_zero() {
                continue;
            }
            let reason = format!("Node runner reward - {:.1}% uptime", runner.uptime * 100.0);
            self.token
                .distribute_reward(runner.address, amount, &reason, Category::Node)
                .await
                .map_err(|err| {
                    tracing::error!(
                        "Node runner reward failed (runner {}, recipient {}, amount {amount}): {err}",
                        runner.name,
                        runner.address
                    );
                    DispenserError::from(err)
                })?;
            tracing::info!("Rewarded {}: {} CDA", runner.name, format_ether(amount));
            paid.push((runner.address, amount));
        }
        Ok(paid)
    }

    /// Snapshot of remaining allocations and utilization. Read-only.
    pub async fn generate_reward_report(&self) -> Result<PathBuf, DispenserError> {
        let cycle = self.token.cycle_info().await?;

        let mut remaining_allocations = BTreeMap::new();
        let mut utilization_rates = BTreeMap::new();
        for category in Category::ALL {
            let remaining = self.token.remaining_allocation(category).await?;
            let bps = utilization_basis_points(self.caps.cap_wei(category), remaining);
            remaining_allocations.insert(category.as_str(), format_ether(remaining));
            utilization_rates.insert(category.as_str(), format_percent(bps));
        }

        let report = RewardReport {
            timestamp: Utc::now().to_rfc3339(),
            cycle: cycle.cycle,
            days_until_reset: cycle.days_until_reset,
            remaining_allocations,
            utilization_rates,
        };

        tracing::info!(
            "Current cycle {}, {} days until reset, activity utilization {}",
            report.cycle,
            report.days_until_reset,
            report.utilization_rates.get("activity").map(String::as_str).unwrap_or("n/a")
        );
        self.reports.write("reward-report", &report).map_err(DispenserError::Report)
    }
}

#[derive(Debug, Serialize)]
pub struct RewardReport {
    pub timestamp: String,
    pub cycle: u64,
    pub days_until_reset: u64,
    pub remaining_allocations: BTreeMap<&'static str, String>,
    pub utilization_rates: BTreeMap<&'static str, String>,
}

fn format_percent(bps: u64) -> String {
    format!("{:.2}%", bps as f64 / 100.0)
}

fn ordinal(place: u32) -> String {
    match place {
        1 => "1st".to_string(),
        2 => "2nd".to_string(),
        3 => "3rd".to_string(),
        n => format!("{n}th"),
    }
}

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

//! Cycle report builders. Pure over ledger-reported data so the math is
//! testable without a chain.

use std::collections::BTreeMap;

use alloy::primitives::{utils::format_ether, U256};
use cda_ledger::{
    apportion::utilization_basis_points, category::to_wei, Category, CategoryCaps, CycleInfo,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CategoryUtilization {
    pub allocated: String,
    pub remaining: String,
    pub used: String,
    pub utilization_rate: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TotalUtilization {
    pub total_allocated: String,
    pub total_used: String,
    pub overall_utilization_rate: String,
}

/// End-of-cycle audit snapshot, written before a reset zeroes the cycle.
#[derive(Debug, Clone, Serialize)]
pub struct FinalCycleReport {
    pub cycle_number: u64,
    pub cycle_end_date: String,
    pub final_allocations: BTreeMap<&'static str, CategoryUtilization>,
    pub total_utilization: TotalUtilization,
}

/// Fresh-cycle snapshot, written after a reset confirms.
#[derive(Debug, Clone, Serialize)]
pub struct NewCycleReport {
    pub new_cycle_number: u64,
    pub cycle_start_date: String,
    pub reset_timestamp: u64,
    pub fresh_allocations: BTreeMap<&'static str, String>,
    pub next_reset_eligible: String,
}

fn format_percent(bps: u64) -> String {
    format!("{:.2}%", bps as f64 / 100.0)
}

fn category_utilization(cap_tokens: u64, remaining: U256) -> CategoryUtilization {
    let cap = to_wei(cap_tokens);
    let used = cap.saturating_sub(remaining);
    CategoryUtilization {
        allocated: cap_tokens.to_string(),
        remaining: format_ether(remaining),
        used: format_ether(used),
        utilization_rate: format_percent(utilization_basis_points(cap, remaining)),
    }
}

pub fn final_cycle_report(
    cycle: &CycleInfo,
    remaining: &BTreeMap<Category, U256>,
    caps: &CategoryCaps,
    now: DateTime<Utc>,
) -> FinalCycleReport {
    let mut final_allocations = BTreeMap::new();
    let mut total_remaining = U256::ZERO;
    for category in Category::ALL {
        let left = remaining.get(&category).copied().unwrap_or(U256::ZERO);
        total_remaining += left;
        final_allocations.insert(category.as_str(), category_utilization(caps.cap(category), left));
    }

    let total_cap = to_wei(caps.total());
    let total_used = total_cap.saturating_sub(total_remaining);
    FinalCycleReport {
        cycle_number: cycle.cycle,
        cycle_end_date: now.to_rfc3339(),
        final_allocations,
        total_utilization: TotalUtilization {
            total_allocated: caps.total().to_string(),
            total_used: format_ether(total_used),
            overall_utilization_rate: format_percent(utilization_basis_points(
                total_cap,
                total_remaining,
            )),
        },
    }
}

pub fn new_cycle_report(cycle: &CycleInfo, caps: &CategoryCaps, now: DateTime<Utc>) -> NewCycleReport {
    let mut fresh_allocations = BTreeMap::new();
    for category in Category::ALL {
        fresh_allocations.insert(category.as_str(), format!("{} CDA", caps.cap(category)));
    }
    fresh_allocations.insert("total", format!("{} CDA", caps.total()));

    let reset_at = DateTime::<Utc>::from_timestamp(cycle.reset_timestamp as i64, 0)
        .unwrap_or(now);
    let next_eligible = reset_at + TimeDelta::days(365);

    NewCycleReport {
        new_cycle_number: cycle.cycle,
        cycle_start_date: now.to_rfc3339(),
        reset_timestamp: cycle.reset_timestamp,
        fresh_allocations,
        next_reset_eligible: next_eligible.to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn cycle(number: u64, reset_timestamp: u64) -> CycleInfo {
        CycleInfo {
            cycle: number,
            reset_timestamp,
            total_supply: U256::ZERO,
            days_until_reset: 0,
        }
    }

    #[test]
    fn utilization_math_per_category() {
        let caps = CategoryCaps::default();
        let mut remaining = BTreeMap::new();
        // Half of activity used; milestone untouched; node fully used.
        remaining.insert(Category::Activity, to_wei(30_000));
        remaining.insert(Category::Milestone, to_wei(15_000));
        remaining.insert(Category::Swag, to_wei(10_000));
        remaining.insert(Category::Nft, to_wei(7_500));
        remaining.insert(Category::Node, U256::ZERO);
        remaining.insert(Category::Admin, to_wei(2_500));

        let now = Utc.with_ymd_and_hms(2026, 7, 31, 0, 0, 0).unwrap();
        let report = final_cycle_report(&cycle(3, 0), &remaining, &caps, now);

        assert_eq!(report.cycle_number, 3);
        assert_eq!(report.final_allocations["activity"].utilization_rate, "50.00%");
        assert_eq!(report.final_allocations["milestone"].utilization_rate, "0.00%");
        assert_eq!(report.final_allocations["node"].utilization_rate, "100.00%");
        assert_eq!(report.final_allocations["activity"].allocated, "60000");

        // 30k activity + 5k node used out of 100k total = 35%.
        assert_eq!(report.total_utilization.overall_utilization_rate, "35.00%");
        assert_eq!(report.total_utilization.total_allocated, "100000");
    }

    #[test]
    fn new_cycle_report_carries_next_eligible_date() {
        let caps = CategoryCaps::default();
        let reset_at = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();
        let now = reset_at + TimeDelta::minutes(2);

        let report = new_cycle_report(&cycle(4, reset_at.timestamp() as u64), &caps, now);

        assert_eq!(report.new_cycle_number, 4);
        assert_eq!(report.fresh_allocations["activity"], "60000 CDA");
        assert_eq!(report.fresh_allocations["total"], "100000 CDA");
        let next: DateTime<Utc> = report.next_reset_eligible.parse().unwrap();
        assert_eq!(next, reset_at + TimeDelta::days(365));
    }
}

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

//! Window math over uptime histories. Windows are half-open `[start, end)`
//! in epoch seconds, so a record on a boundary counts toward exactly one
//! period.

use crate::registry::UptimeRecord;

/// History is bounded to a trailing 30-day window; older records are pruned
/// on every check pass.
pub const HISTORY_WINDOW_DAYS: u64 = 30;

pub const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Uptime over `[start, end)` as a percentage. An empty window scores 0:
/// absence of data is deliberately not treated as 100% or unknown for
/// reward purposes.
pub fn uptime_percentage(history: &[UptimeRecord], start: u64, end: u64) -> f64 {
    let mut total = 0u64;
    let mut online = 0u64;
    for record in history {
        if record.timestamp >= start && record.timestamp < end {
            total += 1;
            if record.online {
                online += 1;
            }
        }
    }
    if total == 0 {
        return 0.0;
    }
    online as f64 / total as f64 * 100.0
}

/// Timestamps at or before this cutoff fall outside the retention window.
pub fn prune_cutoff(now: u64) -> u64 {
    now.saturating_sub(HISTORY_WINDOW_DAYS * SECS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(timestamp: u64, online: bool) -> UptimeRecord {
        UptimeRecord { timestamp, online, block_height: None, response_time_ms: None, synced: None }
    }

    #[test]
    fn empty_window_scores_zero() {
        assert_eq!(uptime_percentage(&[], 0, 100), 0.0);
        let history = vec![record(10, true)];
        assert_eq!(uptime_percentage(&history, 50, 100), 0.0);
    }

    #[test]
    fn window_is_half_open() {
        let history = vec![record(100, true), record(200, false)];
        // End boundary excluded, start boundary included.
        assert_eq!(uptime_percentage(&history, 100, 200), 100.0);
        assert_eq!(uptime_percentage(&history, 100, 201), 50.0);
    }

    #[test]
    fn counts_online_fraction() {
        let mut history: Vec<UptimeRecord> =
            (0..27).map(|i| record(1_000 + i * 86_400, true)).collect();
        history.extend((27..30).map(|i| record(1_000 + i * 86_400, false)));
        let pct = uptime_percentage(&history, 0, 1_000 + 30 * 86_400);
        assert!((pct - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stale_records_fall_outside_the_reward_window() {
        let now = 100 * SECS_PER_DAY;
        let history = vec![
            record(now - 40 * SECS_PER_DAY, true), // stale, also due for pruning
            record(now - SECS_PER_DAY, true),
        ];
        let pct = uptime_percentage(&history, now - 30 * SECS_PER_DAY, now);
        assert_eq!(pct, 100.0);
        // The stale record is at the mercy of pruning as well.
        assert!(history[0].timestamp <= prune_cutoff(now));
        assert!(history[1].timestamp > prune_cutoff(now));
    }
}

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

//! Event-attendance import. Rows with a missing or invalid address are
//! skipped with a warning; a malformed row never aborts the import.

use std::path::Path;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;

use crate::activity::{ActivityRecord, ActivityType, RewardSchedule};

#[derive(Debug, Deserialize)]
struct AttendanceRow {
    #[serde(default)]
    address: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    role: String,
}

/// Reads `{address, name, role}` rows and produces event activity records
/// priced from the reward schedule.
pub fn load_attendance(path: &Path, schedule: &RewardSchedule) -> Result<Vec<ActivityRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open attendance file {}", path.display()))?;

    let mut records = Vec::new();
    for (idx, row) in reader.deserialize::<AttendanceRow>().enumerate() {
        // Header occupies line 1.
        let line = idx + 2;
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                tracing::warn!("Skipping malformed attendance row at line {line}: {err}");
                continue;
            }
        };
        let recipient = match row.address.parse::<Address>() {
            Ok(address) => address,
            Err(err) => {
                tracing::warn!(
                    "Skipping attendance row at line {line} (`{}`): bad address: {err}",
                    row.name
                );
                continue;
            }
        };
        let role = if row.role.is_empty() { "attendee".to_string() } else { row.role };
        tracing::debug!("Attendee {} ({role}) at {recipient}", row.name);
        records.push(ActivityRecord {
            recipient,
            name: row.name,
            activity: ActivityType::Event,
            reward: schedule.amount_wei(ActivityType::Event),
            source: "event attendance import".to_string(),
        });
    }
    tracing::info!("Loaded {} attendees from {}", records.len(), path.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tracing_test::traced_test;

    use super::*;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_well_formed_rows() {
        let file = write_csv(
            "address,name,role\n\
             0x1111111111111111111111111111111111111111,Alice,organizer\n\
             0x2222222222222222222222222222222222222222,Bob,\n",
        );
        let records = load_attendance(file.path(), &RewardSchedule::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Alice");
        assert_eq!(records[0].activity, ActivityType::Event);
        assert_eq!(records[0].reward, RewardSchedule::default().amount_wei(ActivityType::Event));
    }

    #[test]
    #[traced_test]
    fn malformed_rows_are_skipped_not_fatal() {
        let file = write_csv(
            "address,name,role\n\
             ,Missing Address,attendee\n\
             not-an-address,Broken,attendee\n\
             0x3333333333333333333333333333333333333333,Carol,attendee\n",
        );
        let records = load_attendance(file.path(), &RewardSchedule::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Carol");
        assert!(logs_contain("Skipping attendance row"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let missing = Path::new("/nonexistent/attendance.csv");
        assert!(load_attendance(missing, &RewardSchedule::default()).is_err());
    }
}

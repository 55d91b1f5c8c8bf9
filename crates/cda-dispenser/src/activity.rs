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

use std::{fmt, str::FromStr};

use alloy::primitives::{Address, U256};
use cda_ledger::{category::to_wei, Category};
use serde::{Deserialize, Serialize};

/// Reward-worthy activity classes. The names double as the badge contract's
/// activity identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Event,
    Volunteer,
    Presentation,
    Project,
    Hackathon,
    Node,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Event => "event",
            ActivityType::Volunteer => "volunteer",
            ActivityType::Presentation => "presentation",
            ActivityType::Project => "project",
            ActivityType::Hackathon => "hackathon",
            ActivityType::Node => "node",
        }
    }

    /// The allocation bucket this activity draws from.
    pub fn category(&self) -> Category {
        match self {
            ActivityType::Event | ActivityType::Volunteer => Category::Activity,
            ActivityType::Presentation | ActivityType::Project | ActivityType::Hackathon => {
                Category::Milestone
            }
            ActivityType::Node => Category::Node,
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = UnknownActivity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "event" => Ok(ActivityType::Event),
            "volunteer" => Ok(ActivityType::Volunteer),
            "presentation" => Ok(ActivityType::Presentation),
            "project" => Ok(ActivityType::Project),
            "hackathon" => Ok(ActivityType::Hackathon),
            "node" => Ok(ActivityType::Node),
            other => Err(UnknownActivity(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown activity type `{0}`")]
pub struct UnknownActivity(pub String);

/// Fixed CDA-per-activity reward table. Injected configuration with the
/// standard community schedule as default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSchedule {
    pub event_attendance: u64,
    pub volunteer_work: u64,
    pub presentation: u64,
    pub project_completion: u64,
    pub hackathon_win: u64,
}

impl Default for RewardSchedule {
    fn default() -> Self {
        Self {
            event_attendance: 50,
            volunteer_work: 100,
            presentation: 200,
            project_completion: 500,
            hackathon_win: 1000,
        }
    }
}

impl RewardSchedule {
    /// Whole-CDA reward for one occurrence of `activity`. Node rewards are
    /// apportioned from the node pool rather than paid per occurrence.
    pub fn amount(&self, activity: ActivityType) -> u64 {
        match activity {
            ActivityType::Event => self.event_attendance,
            ActivityType::Volunteer => self.volunteer_work,
            ActivityType::Presentation => self.presentation,
            ActivityType::Project => self.project_completion,
            ActivityType::Hackathon => self.hackathon_win,
            ActivityType::Node => 0,
        }
    }

    pub fn amount_wei(&self, activity: ActivityType) -> U256 {
        to_wei(self.amount(activity))
    }
}

/// One reward-worthy event, consumed exactly once by the dispenser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub recipient: Address,
    pub name: String,
    pub activity: ActivityType,
    pub reward: U256,
    pub source: String,
}

/// One hackathon placement, as read from the results file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HackathonWinner {
    pub address: Address,
    pub name: String,
    pub place: u32,
}

/// One node runner's observed uptime over the reward period, as a fraction
/// in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRunnerUptime {
    pub address: Address,
    pub name: String,
    pub uptime: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_category_mapping() {
        assert_eq!(ActivityType::Event.category(), Category::Activity);
        assert_eq!(ActivityType::Volunteer.category(), Category::Activity);
        assert_eq!(ActivityType::Presentation.category(), Category::Milestone);
        assert_eq!(ActivityType::Project.category(), Category::Milestone);
        assert_eq!(ActivityType::Hackathon.category(), Category::Milestone);
        assert_eq!(ActivityType::Node.category(), Category::Node);
    }

    #[test]
    fn default_schedule_amounts() {
        let schedule = RewardSchedule::default();
        assert_eq!(schedule.amount(ActivityType::Event), 50);
        assert_eq!(schedule.amount(ActivityType::Volunteer), 100);
        assert_eq!(schedule.amount(ActivityType::Presentation), 200);
        assert_eq!(schedule.amount(ActivityType::Project), 500);
        assert_eq!(schedule.amount(ActivityType::Hackathon), 1000);
        assert_eq!(schedule.amount_wei(ActivityType::Event), to_wei(50));
    }

    #[test]
    fn activity_names_round_trip() {
        for activity in [
            ActivityType::Event,
            ActivityType::Volunteer,
            ActivityType::Presentation,
            ActivityType::Project,
            ActivityType::Hackathon,
            ActivityType::Node,
        ] {
            assert_eq!(activity.as_str().parse::<ActivityType>().unwrap(), activity);
        }
    }
}

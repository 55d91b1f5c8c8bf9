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

//! Reward dispenser: turns activity records into batched, allocation-capped
//! CDA distributions with badge progression recorded alongside.

pub mod activity;
pub mod attendance;
pub mod dispenser;

pub use activity::{ActivityRecord, ActivityType, HackathonWinner, NodeRunnerUptime, RewardSchedule};
pub use dispenser::{DispenserError, RewardDispenser, MIN_RUNNER_UPTIME};

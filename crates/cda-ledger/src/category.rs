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

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// A per-cycle allocation bucket on the CDA token contract.
///
/// The lowercase names are the wire encoding: the contract's
/// `getRemainingAllocation` / `distributeReward` functions take the category
/// as a string, and rejections reference it by the same name.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Activity,
    Milestone,
    Swag,
    Nft,
    Node,
    Admin,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Activity,
        Category::Milestone,
        Category::Swag,
        Category::Nft,
        Category::Node,
        Category::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Activity => "activity",
            Category::Milestone => "milestone",
            Category::Swag => "swag",
            Category::Nft => "nft",
            Category::Node => "node",
            Category::Admin => "admin",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "activity" => Ok(Category::Activity),
            "milestone" => Ok(Category::Milestone),
            "swag" => Ok(Category::Swag),
            "nft" => Ok(Category::Nft),
            "node" => Ok(Category::Node),
            "admin" => Ok(Category::Admin),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown allocation category `{0}`")]
pub struct UnknownCategory(pub String);

/// Whole-token per-cycle caps for each allocation category.
///
/// The caps live in deployment configuration, not in code: every consumer
/// receives them injected. The defaults mirror the standard deployment
/// (summing to 100_000 CDA per cycle).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCaps {
    pub activity: u64,
    pub milestone: u64,
    pub swag: u64,
    pub nft: u64,
    pub node: u64,
    pub admin: u64,
}

impl Default for CategoryCaps {
    fn default() -> Self {
        Self { activity: 60_000, milestone: 15_000, swag: 10_000, nft: 7_500, node: 5_000, admin: 2_500 }
    }
}

impl CategoryCaps {
    /// Cap for a category, in whole CDA tokens.
    pub fn cap(&self, category: Category) -> u64 {
        match category {
            Category::Activity => self.activity,
            Category::Milestone => self.milestone,
            Category::Swag => self.swag,
            Category::Nft => self.nft,
            Category::Node => self.node,
            Category::Admin => self.admin,
        }
    }

    /// Cap for a category, in wei.
    pub fn cap_wei(&self, category: Category) -> U256 {
        to_wei(self.cap(category))
    }

    /// Sum of all caps, in whole CDA tokens.
    pub fn total(&self) -> u64 {
        Category::ALL.iter().map(|c| self.cap(*c)).sum()
    }
}

/// Converts a whole-CDA amount into its 18-decimal wei representation.
pub fn to_wei(tokens: u64) -> U256 {
    U256::from(tokens) * U256::from(1_000_000_000_000_000_000u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_names_round_trip() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
        assert!("staking".parse::<Category>().is_err());
    }

    #[test]
    fn default_caps_sum_to_total_supply() {
        let caps = CategoryCaps::default();
        assert_eq!(caps.total(), 100_000);
        assert_eq!(caps.cap(Category::Activity), 60_000);
        assert_eq!(caps.cap(Category::Admin), 2_500);
    }

    #[test]
    fn wei_conversion() {
        assert_eq!(to_wei(1), U256::from(10u64).pow(U256::from(18)));
        assert_eq!(CategoryCaps::default().cap_wei(Category::Node), to_wei(5_000));
    }
}

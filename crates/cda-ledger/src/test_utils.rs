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

//! In-memory ledger for tests. Mirrors the contract's allocation semantics:
//! per-category running totals checked against the injected caps, with
//! whole-call rejection (no partial issuance) when a distribution would
//! overrun its cap.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Mutex,
};

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::{
    category::{Category, CategoryCaps},
    contracts::{BadgeInfo, BadgeLedger, CycleInfo, LedgerError, ResetLedger, ResetStatus, TokenLedger},
};

/// One recorded token distribution, for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionCall {
    pub recipient: Address,
    pub amount: U256,
    pub reason: String,
    pub category: Category,
}

#[derive(Debug, Default)]
struct TestLedgerState {
    cycle: u64,
    reset_timestamp: u64,
    distributed: BTreeMap<Category, U256>,
    balances: BTreeMap<Address, U256>,
    calls: Vec<DistributionCall>,
    activity_counts: BTreeMap<(Address, String), u64>,
    can_reset_now: bool,
    reset_reason: String,
    days_until_eligible: u64,
    resets: u64,
    failing_recipients: BTreeSet<Address>,
    forced_transport_failures: u64,
}

pub struct TestLedger {
    caps: CategoryCaps,
    state: Mutex<TestLedgerState>,
}

impl TestLedger {
    pub fn new(caps: CategoryCaps) -> Self {
        let state = TestLedgerState {
            cycle: 1,
            reset_timestamp: 1_700_000_000,
            reset_reason: "cycle still active".to_string(),
            days_until_eligible: 365,
            ..Default::default()
        };
        Self { caps, state: Mutex::new(state) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TestLedgerState> {
        self.state.lock().expect("test ledger lock poisoned")
    }

    pub fn caps(&self) -> &CategoryCaps {
        &self.caps
    }

    /// Recorded distributions, in call order.
    pub fn calls(&self) -> Vec<DistributionCall> {
        self.lock().calls.clone()
    }

    pub fn balance(&self, account: Address) -> U256 {
        self.lock().balances.get(&account).copied().unwrap_or(U256::ZERO)
    }

    pub fn distributed(&self, category: Category) -> U256 {
        self.lock().distributed.get(&category).copied().unwrap_or(U256::ZERO)
    }

    pub fn activity_count(&self, account: Address, activity: &str) -> u64 {
        self.lock().activity_counts.get(&(account, activity.to_string())).copied().unwrap_or(0)
    }

    pub fn reset_count(&self) -> u64 {
        self.lock().resets
    }

    /// Makes distributions to `recipient` fail with a transport error until
    /// cleared, for partial-failure scenarios.
    pub fn fail_distributions_to(&self, recipient: Address) {
        self.lock().failing_recipients.insert(recipient);
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failing_recipients.clear();
        state.forced_transport_failures = 0;
    }

    /// Forces the next `count` token distributions to fail transiently
    /// regardless of recipient, for retry tests.
    pub fn fail_next_transiently(&self, count: u64) {
        self.lock().forced_transport_failures = count;
    }

    pub fn set_reset_eligibility(&self, can_reset_now: bool, reason: &str, days_until_eligible: u64) {
        let mut state = self.lock();
        state.can_reset_now = can_reset_now;
        state.reset_reason = reason.to_string();
        state.days_until_eligible = days_until_eligible;
    }

    fn check_transport_gates(
        state: &mut TestLedgerState,
        recipients: &[Address],
    ) -> Result<(), LedgerError> {
        if state.forced_transport_failures > 0 {
            state.forced_transport_failures -= 1;
            return Err(LedgerError::Transport("injected transport failure".to_string()));
        }
        if recipients.iter().any(|r| state.failing_recipients.contains(r)) {
            return Err(LedgerError::Transport("injected recipient failure".to_string()));
        }
        Ok(())
    }

    fn apply_distribution(
        &self,
        state: &mut TestLedgerState,
        recipients: &[Address],
        amounts: &[U256],
        reason: &str,
        category: Category,
    ) -> Result<(), LedgerError> {
        Self::check_transport_gates(state, recipients)?;

        let requested: U256 = amounts.iter().copied().sum();
        let cap = self.caps.cap_wei(category);
        let used = state.distributed.get(&category).copied().unwrap_or(U256::ZERO);
        let remaining = cap.saturating_sub(used);
        if requested > remaining {
            return Err(LedgerError::AllocationExceeded { category, requested, remaining });
        }

        for (recipient, amount) in recipients.iter().zip(amounts) {
            *state.balances.entry(*recipient).or_default() += *amount;
            state.calls.push(DistributionCall {
                recipient: *recipient,
                amount: *amount,
                reason: reason.to_string(),
                category,
            });
        }
        *state.distributed.entry(category).or_default() += requested;
        Ok(())
    }
}

#[async_trait]
impl TokenLedger for TestLedger {
    async fn balance_of(&self, account: Address) -> Result<U256, LedgerError> {
        Ok(self.balance(account))
    }

    async fn cycle_info(&self) -> Result<CycleInfo, LedgerError> {
        let state = self.lock();
        let total_supply = state.distributed.values().copied().sum();
        Ok(CycleInfo {
            cycle: state.cycle,
            reset_timestamp: state.reset_timestamp,
            total_supply,
            days_until_reset: state.days_until_eligible,
        })
    }

    async fn remaining_allocation(&self, category: Category) -> Result<U256, LedgerError> {
        let state = self.lock();
        let used = state.distributed.get(&category).copied().unwrap_or(U256::ZERO);
        Ok(self.caps.cap_wei(category).saturating_sub(used))
    }

    async fn distribute_reward(
        &self,
        to: Address,
        amount: U256,
        reason: &str,
        category: Category,
    ) -> Result<(), LedgerError> {
        let mut state = self.lock();
        self.apply_distribution(&mut state, &[to], &[amount], reason, category)
    }

    async fn batch_distribute_rewards(
        &self,
        recipients: &[Address],
        amounts: &[U256],
        reason: &str,
        category: Category,
    ) -> Result<(), LedgerError> {
        let mut state = self.lock();
        self.apply_distribution(&mut state, recipients, amounts, reason, category)
    }
}

#[async_trait]
impl BadgeLedger for TestLedger {
    async fn badge_info(&self, account: Address) -> Result<BadgeInfo, LedgerError> {
        let state = self.lock();
        let count = |activity: &str| {
            state.activity_counts.get(&(account, activity.to_string())).copied().unwrap_or(0)
        };
        Ok(BadgeInfo {
            current_level: 0,
            badge_token_ids: vec![],
            events_attended: count("event"),
            volunteered_times: count("volunteer"),
            presentations_made: count("presentation"),
            projects_completed: count("project"),
        })
    }

    async fn record_activity(
        &self,
        account: Address,
        activity: &str,
        count: u64,
    ) -> Result<(), LedgerError> {
        let mut state = self.lock();
        *state.activity_counts.entry((account, activity.to_string())).or_default() += count;
        Ok(())
    }

    async fn batch_record_activity(
        &self,
        accounts: &[Address],
        activity: &str,
        counts: &[u64],
    ) -> Result<(), LedgerError> {
        let mut state = self.lock();
        for (account, count) in accounts.iter().zip(counts) {
            *state.activity_counts.entry((*account, activity.to_string())).or_default() += count;
        }
        Ok(())
    }
}

#[async_trait]
impl ResetLedger for TestLedger {
    async fn reset_status(&self) -> Result<ResetStatus, LedgerError> {
        let state = self.lock();
        Ok(ResetStatus {
            can_reset_now: state.can_reset_now,
            reset_reason: state.reset_reason.clone(),
            days_until_eligible: state.days_until_eligible,
        })
    }

    async fn initiate_reset(&self) -> Result<(), LedgerError> {
        let mut state = self.lock();
        if !state.can_reset_now {
            return Err(LedgerError::Revert(state.reset_reason.clone()));
        }
        state.resets += 1;
        state.cycle += 1;
        state.reset_timestamp += 365 * 86_400;
        state.distributed.clear();
        state.balances.clear();
        state.can_reset_now = false;
        state.days_until_eligible = 365;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    #[tokio::test]
    async fn allocation_cap_is_enforced_without_partial_issuance() {
        let ledger = TestLedger::new(CategoryCaps::default());
        let cap = ledger.caps().cap_wei(Category::Node);

        ledger.distribute_reward(addr(1), cap, "node reward", Category::Node).await.unwrap();

        // One more wei over the cap must be rejected whole.
        let err = ledger
            .distribute_reward(addr(2), U256::from(1u64), "node reward", Category::Node)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AllocationExceeded { category: Category::Node, .. }));
        assert_eq!(ledger.balance(addr(2)), U256::ZERO);
        assert_eq!(ledger.distributed(Category::Node), cap);
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let ledger = TestLedger::new(CategoryCaps::default());
        let cap = ledger.caps().cap_wei(Category::Admin);
        let recipients = [addr(1), addr(2)];
        let amounts = [cap, U256::from(1u64)];

        let err = ledger
            .batch_distribute_rewards(&recipients, &amounts, "admin grant", Category::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AllocationExceeded { .. }));
        assert_eq!(ledger.balance(addr(1)), U256::ZERO, "no partial amount may be issued");
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn reset_starts_a_fresh_cycle() {
        let ledger = TestLedger::new(CategoryCaps::default());
        ledger.distribute_reward(addr(1), U256::from(5u64), "grant", Category::Admin).await.unwrap();

        ledger.set_reset_eligibility(true, "cycle complete", 0);
        ledger.initiate_reset().await.unwrap();

        assert_eq!(ledger.reset_count(), 1);
        assert_eq!(ledger.cycle_info().await.unwrap().cycle, 2);
        assert_eq!(ledger.distributed(Category::Admin), U256::ZERO);
        assert_eq!(
            ledger.remaining_allocation(Category::Admin).await.unwrap(),
            ledger.caps().cap_wei(Category::Admin)
        );
    }
}

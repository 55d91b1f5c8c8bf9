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

use alloy::{
    network::Ethereum,
    primitives::{Address, U256},
    providers::Provider,
};
use async_trait::async_trait;

use super::{CycleInfo, ICdaToken, LedgerError, TokenLedger, TXN_CONFIRM_TIMEOUT};
use crate::category::Category;

/// Client for the CDA ERC-20 token contract.
#[derive(Clone)]
pub struct CdaTokenService<P> {
    instance: ICdaToken::ICdaTokenInstance<P>,
    caller: Address,
}

impl<P> CdaTokenService<P>
where
    P: Provider<Ethereum> + 'static + Clone,
{
    pub fn new(address: Address, provider: P, caller: Address) -> Self {
        Self { instance: ICdaToken::new(address, provider), caller }
    }

    pub fn instance(&self) -> &ICdaToken::ICdaTokenInstance<P> {
        &self.instance
    }

    pub fn address(&self) -> Address {
        *self.instance.address()
    }
}

#[async_trait]
impl<P> TokenLedger for CdaTokenService<P>
where
    P: Provider<Ethereum> + 'static + Clone,
{
    async fn balance_of(&self, account: Address) -> Result<U256, LedgerError> {
        self.instance.balanceOf(account).call().await.map_err(LedgerError::from_contract)
    }

    async fn cycle_info(&self) -> Result<CycleInfo, LedgerError> {
        let ret =
            self.instance.getCycleInfo().call().await.map_err(LedgerError::from_contract)?;
        Ok(CycleInfo {
            cycle: ret.cycle.saturating_to(),
            reset_timestamp: ret.resetTimestamp.saturating_to(),
            total_supply: ret.totalSupply,
            days_until_reset: ret.daysUntilReset.saturating_to(),
        })
    }

    async fn remaining_allocation(&self, category: Category) -> Result<U256, LedgerError> {
        self.instance
            .getRemainingAllocation(category.as_str().to_string())
            .call()
            .await
            .map_err(LedgerError::from_contract)
    }

    async fn distribute_reward(
        &self,
        to: Address,
        amount: U256,
        reason: &str,
        category: Category,
    ) -> Result<(), LedgerError> {
        tracing::debug!("Distributing {amount} to {to} ({category}): {reason}");
        let pending = self
            .instance
            .distributeReward(to, amount, reason.to_string(), category.as_str().to_string())
            .from(self.caller)
            .send()
            .await
            .map_err(LedgerError::from_contract)?;
        let tx_hash = pending
            .with_timeout(Some(TXN_CONFIRM_TIMEOUT))
            .watch()
            .await
            .map_err(|err| LedgerError::Transport(err.to_string()))?;
        tracing::debug!("Distribution to {to} confirmed in {tx_hash}");
        Ok(())
    }

    async fn batch_distribute_rewards(
        &self,
        recipients: &[Address],
        amounts: &[U256],
        reason: &str,
        category: Category,
    ) -> Result<(), LedgerError> {
        tracing::debug!(
            "Batch distributing to {} recipients ({category}): {reason}",
            recipients.len()
        );
        let pending = self
            .instance
            .batchDistributeRewards(
                recipients.to_vec(),
                amounts.to_vec(),
                reason.to_string(),
                category.as_str().to_string(),
            )
            .from(self.caller)
            .send()
            .await
            .map_err(LedgerError::from_contract)?;
        let tx_hash = pending
            .with_timeout(Some(TXN_CONFIRM_TIMEOUT))
            .watch()
            .await
            .map_err(|err| LedgerError::Transport(err.to_string()))?;
        tracing::debug!("Batch distribution confirmed in {tx_hash}");
        Ok(())
    }
}

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

use alloy::{network::Ethereum, primitives::Address, primitives::U256, providers::Provider};
use async_trait::async_trait;

use super::{BadgeInfo, BadgeLedger, ICdaBadge, LedgerError, TXN_CONFIRM_TIMEOUT};

/// Client for the CDA badge NFT contract's activity counters.
#[derive(Clone)]
pub struct CdaBadgeService<P> {
    instance: ICdaBadge::ICdaBadgeInstance<P>,
    caller: Address,
}

impl<P> CdaBadgeService<P>
where
    P: Provider<Ethereum> + 'static + Clone,
{
    pub fn new(address: Address, provider: P, caller: Address) -> Self {
        Self { instance: ICdaBadge::new(address, provider), caller }
    }

    pub fn address(&self) -> Address {
        *self.instance.address()
    }
}

#[async_trait]
impl<P> BadgeLedger for CdaBadgeService<P>
where
    P: Provider<Ethereum> + 'static + Clone,
{
    async fn badge_info(&self, account: Address) -> Result<BadgeInfo, LedgerError> {
        let ret = self
            .instance
            .getUserBadgeInfo(account)
            .call()
            .await
            .map_err(LedgerError::from_contract)?;
        Ok(BadgeInfo {
            current_level: ret.currentLevel.saturating_to(),
            badge_token_ids: ret.badgeTokenIds,
            events_attended: ret.eventsAttended.saturating_to(),
            volunteered_times: ret.volunteeredTimes.saturating_to(),
            presentations_made: ret.presentationsMade.saturating_to(),
            projects_completed: ret.projectsCompleted.saturating_to(),
        })
    }

    async fn record_activity(
        &self,
        account: Address,
        activity: &str,
        count: u64,
    ) -> Result<(), LedgerError> {
        let pending = self
            .instance
            .recordActivity(account, activity.to_string(), U256::from(count))
            .from(self.caller)
            .send()
            .await
            .map_err(LedgerError::from_contract)?;
        pending
            .with_timeout(Some(TXN_CONFIRM_TIMEOUT))
            .watch()
            .await
            .map_err(|err| LedgerError::Transport(err.to_string()))?;
        Ok(())
    }

    async fn batch_record_activity(
        &self,
        accounts: &[Address],
        activity: &str,
        counts: &[u64],
    ) -> Result<(), LedgerError> {
        let counts = counts.iter().map(|c| U256::from(*c)).collect::<Vec<_>>();
        let pending = self
            .instance
            .batchRecordActivity(accounts.to_vec(), activity.to_string(), counts)
            .from(self.caller)
            .send()
            .await
            .map_err(LedgerError::from_contract)?;
        pending
            .with_timeout(Some(TXN_CONFIRM_TIMEOUT))
            .watch()
            .await
            .map_err(|err| LedgerError::Transport(err.to_string()))?;
        Ok(())
    }
}

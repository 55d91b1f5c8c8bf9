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

use super::{ISwagRedemption, LedgerError};

/// One redemption row from the swag contract.
#[derive(Debug, Clone)]
pub struct RedemptionDetail {
    pub user: Address,
    pub item_id: u64,
    pub cda_cost: U256,
    pub timestamp: u64,
    pub fulfilled: bool,
    pub shipping_info: String,
}

/// One catalog item from the swag contract.
#[derive(Debug, Clone)]
pub struct SwagItemDetail {
    pub name: String,
    pub cda_cost: U256,
    pub active: bool,
}

/// Read-only client for the swag redemption contract: view lookups plus
/// ranged event queries for the tracker's polling subscription.
#[derive(Clone)]
pub struct CdaSwagService<P> {
    instance: ISwagRedemption::ISwagRedemptionInstance<P>,
}

impl<P> CdaSwagService<P>
where
    P: Provider<Ethereum> + 'static + Clone,
{
    pub fn new(address: Address, provider: P) -> Self {
        Self { instance: ISwagRedemption::new(address, provider) }
    }

    pub fn address(&self) -> Address {
        *self.instance.address()
    }

    pub async fn current_block(&self) -> Result<u64, LedgerError> {
        self.instance.provider().get_block_number().await.map_err(LedgerError::from_rpc)
    }

    pub async fn redemption(&self, redemption_id: u64) -> Result<RedemptionDetail, LedgerError> {
        let ret = self
            .instance
            .redemptions(U256::from(redemption_id))
            .call()
            .await
            .map_err(LedgerError::from_contract)?;
        Ok(RedemptionDetail {
            user: ret.user,
            item_id: ret.itemId.saturating_to(),
            cda_cost: ret.cdaCost,
            timestamp: ret.timestamp.saturating_to(),
            fulfilled: ret.fulfilled,
            shipping_info: ret.shippingInfo,
        })
    }

    pub async fn swag_item(&self, item_id: u64) -> Result<SwagItemDetail, LedgerError> {
        let ret = self
            .instance
            .swagItems(U256::from(item_id))
            .call()
            .await
            .map_err(LedgerError::from_contract)?;
        Ok(SwagItemDetail { name: ret.name, cda_cost: ret.cdaCost, active: ret.active })
    }

    /// Queries `SwagRedeemed` events in the inclusive block range.
    pub async fn redeemed_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ISwagRedemption::SwagRedeemed>, LedgerError> {
        let logs = self
            .instance
            .SwagRedeemed_filter()
            .from_block(from_block)
            .to_block(to_block)
            .query()
            .await
            .map_err(|err| LedgerError::Transport(err.to_string()))?;
        Ok(logs.into_iter().map(|(event, _)| event).collect())
    }

    /// Queries `RedemptionFulfilled` events in the inclusive block range.
    pub async fn fulfilled_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ISwagRedemption::RedemptionFulfilled>, LedgerError> {
        let logs = self
            .instance
            .RedemptionFulfilled_filter()
            .from_block(from_block)
            .to_block(to_block)
            .query()
            .await
            .map_err(|err| LedgerError::Transport(err.to_string()))?;
        Ok(logs.into_iter().map(|(event, _)| event).collect())
    }
}

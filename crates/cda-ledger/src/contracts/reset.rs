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

use alloy::{network::Ethereum, primitives::Address, providers::Provider};
use async_trait::async_trait;

use super::{ICdaResetManager, LedgerError, ResetLedger, ResetStatus, TXN_CONFIRM_TIMEOUT};

/// Client for the reset manager contract gating the annual cycle reset.
#[derive(Clone)]
pub struct CdaResetService<P> {
    instance: ICdaResetManager::ICdaResetManagerInstance<P>,
    caller: Address,
}

impl<P> CdaResetService<P>
where
    P: Provider<Ethereum> + 'static + Clone,
{
    pub fn new(address: Address, provider: P, caller: Address) -> Self {
        Self { instance: ICdaResetManager::new(address, provider), caller }
    }

    pub fn address(&self) -> Address {
        *self.instance.address()
    }
}

#[async_trait]
impl<P> ResetLedger for CdaResetService<P>
where
    P: Provider<Ethereum> + 'static + Clone,
{
    async fn reset_status(&self) -> Result<ResetStatus, LedgerError> {
        let ret =
            self.instance.getResetStatus().call().await.map_err(LedgerError::from_contract)?;
        Ok(ResetStatus {
            can_reset_now: ret.canResetNow,
            reset_reason: ret.resetReason,
            days_until_eligible: ret.daysUntilEligible.saturating_to(),
        })
    }

    async fn initiate_reset(&self) -> Result<(), LedgerError> {
        tracing::info!("Submitting reset transaction");
        let pending = self
            .instance
            .initiateReset()
            .from(self.caller)
            .send()
            .await
            .map_err(LedgerError::from_contract)?;
        let tx_hash = pending
            .with_timeout(Some(TXN_CONFIRM_TIMEOUT))
            .watch()
            .await
            .map_err(|err| LedgerError::Transport(err.to_string()))?;
        tracing::info!("Reset confirmed in {tx_hash}");
        Ok(())
    }
}

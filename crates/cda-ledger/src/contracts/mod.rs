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

//! Typed clients for the on-chain CDA token economy.
//!
//! The contracts are external collaborators with a fixed ABI; nothing here
//! reimplements their logic. The service wrappers shape calls, bound
//! confirmation waits, and decode revert data into [`LedgerError`] so callers
//! can distinguish terminal on-chain rejections from transient transport
//! failures.

use std::{str::FromStr, sync::Arc};

use alloy::{
    contract::Error as ContractErr,
    primitives::{Address, Bytes, U256},
    sol_types::SolInterface,
    transports::{RpcError, TransportError},
};
use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Duration;

use crate::{
    category::Category,
    errors::CodedError,
    impl_coded_debug,
    retry::Transient,
};

mod badge;
mod reset;
mod swag;
mod token;

pub use badge::CdaBadgeService;
pub use reset::CdaResetService;
pub use swag::{CdaSwagService, RedemptionDetail, SwagItemDetail};
pub use token::CdaTokenService;

/// How long to wait for a submitted transaction to confirm before giving up.
pub(crate) const TXN_CONFIRM_TIMEOUT: Duration = Duration::from_secs(45);

alloy::sol! {
    #[sol(rpc)]
    interface ICdaToken {
        function balanceOf(address account) external view returns (uint256);
        function getCycleInfo() external view returns (uint256 cycle, uint256 resetTimestamp, uint256 totalSupply, uint256 daysUntilReset);
        function getRemainingAllocation(string calldata category) external view returns (uint256);
        function distributeReward(address to, uint256 amount, string calldata reason, string calldata category) external;
        function batchDistributeRewards(address[] calldata recipients, uint256[] calldata amounts, string calldata reason, string calldata category) external;

        error AllocationExceeded(string category, uint256 requested, uint256 remaining);
        error InvalidCategory(string category);
    }
}

alloy::sol! {
    #[sol(rpc)]
    interface ICdaBadge {
        function getUserBadgeInfo(address account) external view returns (uint256 currentLevel, uint256[] memory badgeTokenIds, uint256 eventsAttended, uint256 volunteeredTimes, uint256 presentationsMade, uint256 projectsCompleted);
        function recordActivity(address account, string calldata activityType, uint256 count) external;
        function batchRecordActivity(address[] calldata accounts, string calldata activityType, uint256[] calldata counts) external;
    }
}

alloy::sol! {
    #[sol(rpc)]
    interface ICdaResetManager {
        function getResetStatus() external view returns (bool canResetNow, string memory resetReason, uint256 daysUntilEligible);
        function initiateReset() external;
    }
}

alloy::sol! {
    #[sol(rpc)]
    interface ISwagRedemption {
        function redemptions(uint256 redemptionId) external view returns (address user, uint256 itemId, uint256 cdaCost, uint256 timestamp, bool fulfilled, string memory shippingInfo);
        function swagItems(uint256 itemId) external view returns (string memory name, uint256 cdaCost, bool active);

        event SwagRedeemed(uint256 indexed redemptionId, address indexed user, uint256 indexed itemId, uint256 cdaCost);
        event RedemptionFulfilled(uint256 indexed redemptionId, address indexed user);
    }
}

/// Snapshot of the active annual cycle, as reported by the token contract.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CycleInfo {
    pub cycle: u64,
    pub reset_timestamp: u64,
    pub total_supply: U256,
    pub days_until_reset: u64,
}

/// Result of the reset manager's eligibility query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetStatus {
    pub can_reset_now: bool,
    pub reset_reason: String,
    pub days_until_eligible: u64,
}

/// Per-user badge progression counters from the badge contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeInfo {
    pub current_level: u64,
    pub badge_token_ids: Vec<U256>,
    pub events_attended: u64,
    pub volunteered_times: u64,
    pub presentations_made: u64,
    pub projects_completed: u64,
}

#[derive(Error)]
pub enum LedgerError {
    /// The contract rejected a distribution that would overrun a category's
    /// per-cycle cap. Terminal: the ledger's answer is authoritative and the
    /// call must not be retried.
    #[error("{code} allocation exceeded for `{category}`: requested {requested}, remaining {remaining}", code = self.code())]
    AllocationExceeded { category: Category, requested: U256, remaining: U256 },

    #[error("{code} contract rejected category `{0}`", code = self.code())]
    InvalidCategory(String),

    /// Any other on-chain revert. Terminal.
    #[error("{code} contract reverted: {0}", code = self.code())]
    Revert(String),

    /// RPC-level failure (timeout, connection refused, node error). Eligible
    /// for bounded retry.
    #[error("{code} transport error: {0}", code = self.code())]
    Transport(String),

    #[error("{code} {0:#}", code = self.code())]
    Other(#[from] anyhow::Error),
}

impl_coded_debug!(LedgerError);

impl CodedError for LedgerError {
    fn code(&self) -> &str {
        match self {
            LedgerError::AllocationExceeded { .. } => "[C-LED-101]",
            LedgerError::InvalidCategory(_) => "[C-LED-102]",
            LedgerError::Revert(_) => "[C-LED-103]",
            LedgerError::Transport(_) => "[C-LED-104]",
            LedgerError::Other(_) => "[C-LED-100]",
        }
    }
}

impl Transient for LedgerError {
    fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Transport(_))
    }
}

impl LedgerError {
    /// Classifies an alloy contract error: node error responses carry revert
    /// data and are trial-decoded against the token contract's custom errors;
    /// everything else at the transport layer is transient.
    pub(crate) fn from_contract(err: ContractErr) -> Self {
        match err {
            ContractErr::TransportError(TransportError::ErrorResp(payload)) => {
                let Some(data) = payload.data else {
                    return LedgerError::Revert(format!("code {}: {}", payload.code, payload.message));
                };

                let raw = data.get().trim_matches('"');
                let Ok(bytes) = Bytes::from_str(raw) else {
                    return LedgerError::Revert(format!("undecodable revert data: {raw}"));
                };

                match ICdaToken::ICdaTokenErrors::abi_decode(&bytes) {
                    Ok(ICdaToken::ICdaTokenErrors::AllocationExceeded(inner)) => {
                        match inner.category.parse::<Category>() {
                            Ok(category) => LedgerError::AllocationExceeded {
                                category,
                                requested: inner.requested,
                                remaining: inner.remaining,
                            },
                            Err(_) => LedgerError::InvalidCategory(inner.category),
                        }
                    }
                    Ok(ICdaToken::ICdaTokenErrors::InvalidCategory(inner)) => {
                        LedgerError::InvalidCategory(inner.category)
                    }
                    Err(_) => LedgerError::Revert(format!("code {}: {}", payload.code, payload.message)),
                }
            }
            ContractErr::TransportError(other) => LedgerError::Transport(other.to_string()),
            other => LedgerError::Other(other.into()),
        }
    }

    pub(crate) fn from_rpc(err: RpcError<alloy::transports::TransportErrorKind>) -> Self {
        LedgerError::Transport(err.to_string())
    }
}

/// View/mutating surface of the CDA token contract.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    async fn balance_of(&self, account: Address) -> Result<U256, LedgerError>;
    async fn cycle_info(&self) -> Result<CycleInfo, LedgerError>;
    async fn remaining_allocation(&self, category: Category) -> Result<U256, LedgerError>;
    async fn distribute_reward(
        &self,
        to: Address,
        amount: U256,
        reason: &str,
        category: Category,
    ) -> Result<(), LedgerError>;
    /// All-or-nothing batched distribution; a rejection means no recipient
    /// in the batch received anything.
    async fn batch_distribute_rewards(
        &self,
        recipients: &[Address],
        amounts: &[U256],
        reason: &str,
        category: Category,
    ) -> Result<(), LedgerError>;
}

/// Badge progression surface of the badge NFT contract.
#[async_trait]
pub trait BadgeLedger: Send + Sync {
    async fn badge_info(&self, account: Address) -> Result<BadgeInfo, LedgerError>;
    async fn record_activity(
        &self,
        account: Address,
        activity: &str,
        count: u64,
    ) -> Result<(), LedgerError>;
    async fn batch_record_activity(
        &self,
        accounts: &[Address],
        activity: &str,
        counts: &[u64],
    ) -> Result<(), LedgerError>;
}

/// Reset surface of the reset manager contract.
#[async_trait]
pub trait ResetLedger: Send + Sync {
    async fn reset_status(&self) -> Result<ResetStatus, LedgerError>;
    async fn initiate_reset(&self) -> Result<(), LedgerError>;
}

pub type TokenLedgerObj = Arc<dyn TokenLedger>;
pub type BadgeLedgerObj = Arc<dyn BadgeLedger>;
pub type ResetLedgerObj = Arc<dyn ResetLedger>;

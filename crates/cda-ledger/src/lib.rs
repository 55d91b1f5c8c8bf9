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

//! Shared client and service plumbing for the CDA token economy.
//!
//! The on-chain contracts own all balances and per-category allocation caps;
//! this crate gives the off-chain services a typed view of them
//! ([`contracts`]) plus the cross-cutting pieces they all need: category
//! configuration, deterministic proportional splitting, bounded retry,
//! best-effort notifications, audit-trail reports, and calendar triggers.

pub mod apportion;
pub mod category;
pub mod contracts;
pub mod errors;
pub mod notify;
pub mod reports;
pub mod retry;
pub mod schedule;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use category::{Category, CategoryCaps};
pub use contracts::{
    BadgeLedger, BadgeLedgerObj, CdaBadgeService, CdaResetService, CdaSwagService,
    CdaTokenService, CycleInfo, LedgerError, ResetLedger, ResetLedgerObj, ResetStatus,
    TokenLedger, TokenLedgerObj,
};

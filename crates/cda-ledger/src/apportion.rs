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

//! Deterministic proportional splitting. Shares are floored into integer
//! basis points before touching token amounts, so the final division never
//! happens in floating point and results are identical across runs.
//! Residual basis points from flooring stay in the source allocation.

use alloy::primitives::U256;

pub const BASIS_POINTS: u64 = 10_000;

/// Floors `score / total` into basis points. Degenerate totals yield 0.
pub fn share_basis_points(score: f64, total: f64) -> u64 {
    if !(total > 0.0) || !(score > 0.0) {
        return 0;
    }
    let bps = (score / total * BASIS_POINTS as f64).floor();
    if bps < 0.0 {
        0
    } else {
        (bps as u64).min(BASIS_POINTS)
    }
}

/// Applies a basis-point share to a pool amount.
pub fn apply_basis_points(pool: U256, bps: u64) -> U256 {
    pool * U256::from(bps) / U256::from(BASIS_POINTS)
}

/// Used fraction of an allocation in basis points, given its cap and the
/// ledger-reported remaining amount.
pub fn utilization_basis_points(cap: U256, remaining: U256) -> u64 {
    if cap.is_zero() {
        return 0;
    }
    let used = cap.saturating_sub(remaining);
    (used * U256::from(BASIS_POINTS) / cap).saturating_to()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shares_are_monotonic_and_bounded() {
        let total = 90.0 + 85.0 + 80.0;
        let pool = U256::from(1000u64);
        let shares: Vec<U256> = [90.0, 85.0, 80.0]
            .iter()
            .map(|score| apply_basis_points(pool, share_basis_points(*score, total)))
            .collect();

        assert!(shares[0] > shares[1]);
        assert!(shares[1] > shares[2]);

        let paid: U256 = shares.iter().copied().sum();
        assert!(paid <= pool, "rounding must never over-pay");
        // Flooring loses at most one unit per recipient at this pool size.
        assert!(pool - paid <= U256::from(shares.len() as u64));
    }

    #[test]
    fn sole_qualifier_takes_whole_pool() {
        let bps = share_basis_points(0.9, 0.9);
        assert_eq!(bps, BASIS_POINTS);
        assert_eq!(apply_basis_points(U256::from(5000u64), bps), U256::from(5000u64));
    }

    #[test]
    fn degenerate_inputs_yield_zero() {
        assert_eq!(share_basis_points(1.0, 0.0), 0);
        assert_eq!(share_basis_points(0.0, 10.0), 0);
        assert_eq!(share_basis_points(-1.0, 10.0), 0);
        assert_eq!(apply_basis_points(U256::from(1000u64), 0), U256::ZERO);
    }

    #[test]
    fn share_is_floored_not_rounded() {
        // 1/3 of 10_000 bps = 3333.33… → 3333.
        assert_eq!(share_basis_points(1.0, 3.0), 3333);
    }

    #[test]
    fn utilization_from_cap_and_remaining() {
        let cap = U256::from(60_000u64);
        assert_eq!(utilization_basis_points(cap, U256::from(60_000u64)), 0);
        assert_eq!(utilization_basis_points(cap, U256::from(45_000u64)), 2_500);
        assert_eq!(utilization_basis_points(cap, U256::ZERO), 10_000);
        assert_eq!(utilization_basis_points(U256::ZERO, U256::ZERO), 0);
    }
}

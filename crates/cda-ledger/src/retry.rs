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

use std::{fmt::Display, future::Future};

use tokio::time::Duration;

/// Default attempt budget for transient failures.
pub const DEFAULT_ATTEMPTS: u32 = 3;
/// Initial delay before the first retry; doubles per attempt.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);

/// Errors that may succeed on retry. On-chain rejections are never
/// transient: the ledger's answer is final.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Runs `op` until it succeeds, fails terminally, or exhausts `attempts`.
/// Only errors reporting [`Transient::is_transient`] are retried, with the
/// delay doubling after each attempt.
pub async fn with_backoff<T, E, F, Fut>(
    attempts: u32,
    initial_delay: Duration,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Display,
{
    let mut delay = initial_delay;
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < attempts => {
                tracing::warn!(
                    "Transient failure (attempt {attempt}/{attempts}), retrying in {delay:?}: {err}"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug, thiserror::Error)]
    enum TestErr {
        #[error("flaky")]
        Flaky,
        #[error("fatal")]
        Fatal,
    }

    impl Transient for TestErr {
        fn is_transient(&self) -> bool {
            matches!(self, TestErr::Flaky)
        }
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let res = with_backoff(3, Duration::from_millis(1), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(TestErr::Flaky)
            } else {
                Ok(42u32)
            }
        })
        .await;
        assert_eq!(res.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn transient_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let res: Result<(), _> = with_backoff(3, Duration::from_millis(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestErr::Flaky)
        })
        .await;
        assert!(matches!(res, Err(TestErr::Flaky)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let res: Result<(), _> = with_backoff(3, Duration::from_millis(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestErr::Fatal)
        })
        .await;
        assert!(matches!(res, Err(TestErr::Fatal)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

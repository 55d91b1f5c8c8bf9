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

/// Errors that carry a stable, grep-able code in their display form.
///
/// Codes are bracketed component-prefixed identifiers (e.g. `[C-LED-101]`)
/// so operators can match log lines against runbooks without depending on
/// message wording.
pub trait CodedError: std::error::Error {
    fn code(&self) -> &str;
}

/// Derives `Debug` from `Display` so coded errors render their code when
/// logged with `{:?}` (e.g. inside `anyhow` chains).
#[macro_export]
macro_rules! impl_coded_debug {
    ($name:ident) => {
        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{self}")
            }
        }
    };
}

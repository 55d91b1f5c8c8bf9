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

//! Audit-trail JSON files. Reports get timestamped append-style names and
//! are never overwritten; state files are replaced atomically (write to a
//! temp file, then rename).

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Serialize;

/// Atomically replaces `path` with the pretty-printed JSON of `value`.
pub fn write_json_atomic(path: &Path, value: &impl Serialize) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create {}", parent.display()))?;
    let filename = path.file_name().map(|f| f.to_string_lossy()).unwrap_or_default();
    let temp = parent.join(format!(".{filename}.tmp"));
    let json = serde_json::to_string_pretty(value)?;
    fs::write(&temp, json).with_context(|| format!("Failed to write {}", temp.display()))?;
    if let Err(err) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(err).with_context(|| format!("Failed to replace {}", path.display()));
    }
    Ok(())
}

/// Writes timestamped report files under a fixed directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `<dir>/<prefix>-<unix_millis>.json`. Existing files are never
    /// overwritten; on a same-millisecond collision the timestamp is bumped.
    pub fn write(&self, prefix: &str, report: &impl Serialize) -> Result<PathBuf> {
        let mut stamp = chrono::Utc::now().timestamp_millis().max(0);
        let path = loop {
            let candidate = self.dir.join(format!("{prefix}-{stamp}.json"));
            if !candidate.exists() {
                break candidate;
            }
            stamp += 1;
        };
        write_json_atomic(&path, report)?;
        tracing::info!("Report saved to {}", path.display());
        Ok(path)
    }
}

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

use std::{path::PathBuf, time::Duration};

use alloy::{primitives::Address, providers::ProviderBuilder};
use anyhow::{bail, Context, Result};
use cda_ledger::{notify::Notifier, reports::ReportWriter, CdaSwagService};
use cda_swag_tracker::{store::SwagStore, SwagTracker, DEFAULT_OVERDUE_DAYS};
use chrono::Utc;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Arguments of the swag burn tracker.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct MainArgs {
    /// URL of the Ethereum RPC endpoint.
    #[clap(short, long, env)]
    rpc_url: Url,
    /// Address of the swag redemption contract.
    #[clap(long, env)]
    swag_redemption_address: Address,
    /// Directory for the tracking state file.
    #[clap(long, env, default_value = "data")]
    data_dir: PathBuf,
    /// Directory for burn report files.
    #[clap(long, env, default_value = "reports")]
    report_dir: PathBuf,
    /// Directory for CSV exports.
    #[clap(long, env, default_value = "exports")]
    export_dir: PathBuf,
    /// Seconds between event polls.
    #[clap(long, default_value = "60")]
    poll_interval: u64,
    /// Days before an unfulfilled redemption counts as overdue.
    #[clap(long, default_value_t = DEFAULT_OVERDUE_DAYS)]
    overdue_days: u64,
    /// First block to scan on a fresh state file.
    #[clap(long)]
    start_block: Option<u64>,
    /// Optional webhook for redemption notifications.
    #[clap(long, env)]
    notification_webhook: Option<Url>,
    /// Log in JSON format.
    #[clap(long, env)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before clap resolves env-bound arguments.
    let dotenv_result = dotenvy::dotenv();

    let args = MainArgs::parse();

    if args.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .json()
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }

    match dotenv_result {
        Ok(path) => tracing::debug!("Loaded environment variables from {:?}", path),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => bail!("failed to load .env file: {}", e),
    }

    run(&args).await
}

async fn run(args: &MainArgs) -> Result<()> {
    // Tracking is read-only against the chain; no wallet needed.
    let provider = ProviderBuilder::new().connect_http(args.rpc_url.clone());
    let swag = CdaSwagService::new(args.swag_redemption_address, provider);

    let cancel = CancellationToken::new();
    let tracker = SwagTracker::new(
        swag,
        SwagStore::new(&args.data_dir),
        Notifier::new("CDA Swag Tracker", args.notification_webhook.clone()),
        ReportWriter::new(&args.report_dir),
        Duration::from_secs(args.poll_interval),
        args.start_block,
        cancel.clone(),
    );

    // Startup reporting pass over the restored state.
    tracker.generate_burn_report().await.context("Failed to write burn report")?;
    tracker.export_csv(&args.export_dir).await.context("Failed to export CSV")?;
    tracker.check_overdue_redemptions(args.overdue_days, Utc::now()).await;

    tokio::select! {
        result = tracker.run() => {
            result.context("Tracker terminated")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down swag burn tracker");
            tracker.stop();
        }
    }
    Ok(())
}

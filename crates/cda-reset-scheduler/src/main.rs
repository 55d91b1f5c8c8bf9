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

use std::{path::PathBuf, sync::Arc};

use alloy::{
    network::EthereumWallet, primitives::Address, providers::ProviderBuilder,
    signers::local::PrivateKeySigner,
};
use anyhow::{bail, Context, Result};
use cda_ledger::{
    reports::ReportWriter, CategoryCaps, CdaResetService, CdaTokenService,
};
use cda_reset_scheduler::{ResetSchedule, ResetSchedulerService, DEFAULT_RESET_CRON};
use clap::Parser;
use url::Url;

/// Arguments of the reset scheduler.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct MainArgs {
    /// URL of the Ethereum RPC endpoint.
    #[clap(short, long, env)]
    rpc_url: Url,
    /// Private key used to sign the reset transaction.
    #[clap(long, env)]
    private_key: PrivateKeySigner,
    /// Address of the CDA token contract.
    #[clap(long, env)]
    cda_token_address: Address,
    /// Address of the reset manager contract.
    #[clap(long, env)]
    reset_manager_address: Address,
    /// Cron expression for the annual reset window.
    #[clap(long, env, default_value = DEFAULT_RESET_CRON)]
    reset_cron: String,
    /// Perform all side-effect-free steps but suppress the reset call.
    #[clap(long, env)]
    dry_run: bool,
    /// Optional webhook for operator notifications.
    #[clap(long, env)]
    notification_webhook: Option<Url>,
    /// Directory for cycle report files.
    #[clap(long, env, default_value = "reports")]
    report_dir: PathBuf,
    /// Directory for pre-reset backups.
    #[clap(long, env, default_value = "backups")]
    backup_dir: PathBuf,
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
    let caller = args.private_key.address();
    let wallet = EthereumWallet::from(args.private_key.clone());
    let provider = ProviderBuilder::new().wallet(wallet).connect_http(args.rpc_url.clone());

    let token = Arc::new(CdaTokenService::new(args.cda_token_address, provider.clone(), caller));
    let reset = Arc::new(CdaResetService::new(args.reset_manager_address, provider, caller));

    let schedule = ResetSchedule {
        enabled: true,
        cron: args.reset_cron.clone(),
        dry_run: args.dry_run,
        notification_webhook: args.notification_webhook.clone(),
    };
    let cancel = tokio_util::sync::CancellationToken::new();
    let service = ResetSchedulerService::new(
        token,
        reset,
        CategoryCaps::default(),
        schedule,
        ReportWriter::new(&args.report_dir),
        ReportWriter::new(&args.backup_dir),
        cancel.clone(),
    )
    .context("Failed to construct reset scheduler")?;

    tokio::select! {
        result = service.run() => {
            result.context("Scheduler terminated")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down reset scheduler");
            service.stop();
        }
    }
    Ok(())
}

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

use std::{path::PathBuf, sync::Arc, time::Duration};

use alloy::{
    network::EthereumWallet, primitives::Address, providers::ProviderBuilder,
    signers::local::PrivateKeySigner,
};
use anyhow::{bail, Context, Result};
use cda_ledger::{reports::ReportWriter, CdaTokenService};
use cda_node_monitor::{registry::NodeRegistry, store::DataStore, UptimeMonitor};
use chrono::Utc;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::fmt::format::FmtSpan;
use url::Url;

/// Arguments of the node uptime monitor.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct MainArgs {
    /// URL of the Ethereum RPC endpoint.
    #[clap(short, long, env)]
    rpc_url: Url,
    /// Private key used to sign reward distributions.
    #[clap(long, env)]
    private_key: PrivateKeySigner,
    /// Address of the CDA token contract.
    #[clap(long, env)]
    cda_token_address: Address,
    /// Node fleet configuration file.
    #[clap(long, env, default_value = "config/nodes.json")]
    nodes_config: PathBuf,
    /// Directory for uptime and reward state files.
    #[clap(long, env, default_value = "data")]
    data_dir: PathBuf,
    /// Directory for monthly report files.
    #[clap(long, env, default_value = "reports")]
    report_dir: PathBuf,
    /// Seconds between fleet health-check passes.
    #[clap(long, default_value = "300")]
    check_interval: u64,
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
            .with_span_events(FmtSpan::CLOSE)
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
    // A fleet we cannot load is a configuration error: refuse to start.
    let registry = NodeRegistry::from_config_file(&args.nodes_config)?;
    if registry.is_empty() {
        bail!("node configuration {} lists no nodes", args.nodes_config.display());
    }

    let caller = args.private_key.address();
    let wallet = EthereumWallet::from(args.private_key.clone());
    let provider = ProviderBuilder::new().wallet(wallet).connect_http(args.rpc_url.clone());
    let token = Arc::new(CdaTokenService::new(args.cda_token_address, provider, caller));

    let cancel = CancellationToken::new();
    let monitor = UptimeMonitor::new(
        registry,
        token,
        DataStore::new(&args.data_dir),
        ReportWriter::new(&args.report_dir),
        Duration::from_secs(args.check_interval),
        cancel.clone(),
    );

    tokio::select! {
        result = monitor.run() => {
            result.context("Monitor terminated")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down node uptime monitor");
            monitor.stop();
        }
    }

    let stats = monitor.uptime_stats(Utc::now()).await;
    tracing::info!(
        "Final stats: {}/{} nodes online, 30-day average uptime {:.2}%",
        stats.overall.online_nodes,
        stats.overall.total_nodes,
        stats.overall.average_uptime_30d
    );
    Ok(())
}

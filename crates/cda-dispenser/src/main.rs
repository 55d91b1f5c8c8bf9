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
    network::EthereumWallet,
    primitives::{Address, U256},
    providers::ProviderBuilder,
    signers::local::PrivateKeySigner,
};
use anyhow::{bail, Context, Result};
use cda_dispenser::{
    attendance::load_attendance, HackathonWinner, NodeRunnerUptime, RewardDispenser,
    RewardSchedule,
};
use cda_ledger::{
    category::to_wei, reports::ReportWriter, CategoryCaps, CdaBadgeService, CdaTokenService,
};
use clap::{Parser, Subcommand};
use url::Url;

/// Arguments of the reward dispenser.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct MainArgs {
    /// URL of the Ethereum RPC endpoint.
    #[clap(short, long, env)]
    rpc_url: Url,
    /// Private key used to sign distribution transactions.
    #[clap(long, env)]
    private_key: PrivateKeySigner,
    /// Address of the CDA token contract.
    #[clap(long, env)]
    cda_token_address: Address,
    /// Address of the CDA badge NFT contract.
    #[clap(long, env)]
    badge_nft_address: Address,
    /// Directory for report files.
    #[clap(long, env, default_value = "reports")]
    report_dir: PathBuf,
    /// Per-cycle category caps, whole CDA tokens.
    #[clap(long, env, default_value = "60000")]
    cap_activity: u64,
    #[clap(long, env, default_value = "15000")]
    cap_milestone: u64,
    #[clap(long, env, default_value = "10000")]
    cap_swag: u64,
    #[clap(long, env, default_value = "7500")]
    cap_nft: u64,
    #[clap(long, env, default_value = "5000")]
    cap_node: u64,
    #[clap(long, env, default_value = "2500")]
    cap_admin: u64,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a reward distribution report.
    Report,
    /// Import event attendance from a CSV file and distribute rewards.
    ImportAttendance {
        /// Path to the attendance CSV ({address, name, role} rows).
        #[clap(long)]
        csv: PathBuf,
    },
    /// Distribute a single out-of-band reward.
    Special {
        #[clap(long)]
        recipient: Address,
        /// Amount in whole CDA tokens.
        #[clap(long)]
        amount: u64,
        #[clap(long)]
        reason: String,
        #[clap(long, default_value = "milestone")]
        category: cda_ledger::Category,
    },
    /// Distribute placement-tiered hackathon rewards.
    Hackathon {
        /// JSON file with [{address, name, place}] entries.
        #[clap(long)]
        winners: PathBuf,
    },
    /// Split the remaining node allocation across qualifying runners.
    NodeRunners {
        /// JSON file with [{address, name, uptime}] entries.
        #[clap(long)]
        runners: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment variables from {:?}", path),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => bail!("failed to load .env file: {}", e),
    }

    let args = MainArgs::parse();
    run(&args).await
}

async fn run(args: &MainArgs) -> Result<()> {
    let caller = args.private_key.address();
    let wallet = EthereumWallet::from(args.private_key.clone());
    let provider = ProviderBuilder::new().wallet(wallet).connect_http(args.rpc_url.clone());

    let token = Arc::new(CdaTokenService::new(args.cda_token_address, provider.clone(), caller));
    let badge = Arc::new(CdaBadgeService::new(args.badge_nft_address, provider, caller));
    let caps = CategoryCaps {
        activity: args.cap_activity,
        milestone: args.cap_milestone,
        swag: args.cap_swag,
        nft: args.cap_nft,
        node: args.cap_node,
        admin: args.cap_admin,
    };
    let dispenser = RewardDispenser::new(
        token,
        badge,
        RewardSchedule::default(),
        caps,
        ReportWriter::new(&args.report_dir),
    );

    match &args.command {
        Command::Report => {
            dispenser.generate_reward_report().await?;
        }
        Command::ImportAttendance { csv } => {
            let records = load_attendance(csv, dispenser.schedule())?;
            if records.is_empty() {
                bail!("no valid attendees in {}", csv.display());
            }
            dispenser.process_activity_batch(&records).await?;
            tracing::info!("Processed {} event attendees", records.len());
        }
        Command::Special { recipient, amount, reason, category } => {
            dispenser
                .distribute_special_reward(*recipient, to_wei(*amount), reason, *category)
                .await?;
        }
        Command::Hackathon { winners } => {
            let winners: Vec<HackathonWinner> = read_json(winners)?;
            dispenser.distribute_hackathon_rewards(&winners).await?;
        }
        Command::NodeRunners { runners } => {
            let runners: Vec<NodeRunnerUptime> = read_json(runners)?;
            let paid = dispenser.distribute_node_runner_rewards(&runners).await?;
            let total: U256 = paid.iter().map(|(_, amount)| *amount).sum();
            tracing::info!(
                "Paid {} runners a total of {} CDA",
                paid.len(),
                alloy::primitives::utils::format_ether(total)
            );
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

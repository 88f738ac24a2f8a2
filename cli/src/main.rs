//! ChainRelay CLI.
//!
//! # Commands
//! ```text
//! chainrelay run          --config <relay.yaml>
//! chainrelay check-config --config <relay.yaml>
//! chainrelay decode-log   --abi <path.json> --topics <...> --data <hex>
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod cmd_check;
mod cmd_decode;
mod cmd_run;

#[derive(Parser)]
#[command(
    name = "chainrelay",
    about = "Contract event relay: EVM logs in, normalized records out",
    long_about = "
ChainRelay subscribes to contract logs over WebSocket JSON-RPC, decodes them
against the contract ABI and POSTs one normalized record per event to an HTTP sink.

ENVIRONMENT VARIABLES:
  RUST_LOG                  Overrides the configured log level
  <chain.ws_url_env>        WebSocket endpoint per chain (a .env file is loaded)
",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay and run until Ctrl-C
    Run {
        /// Path to the relay YAML config
        #[arg(short, long, env = "CHAINRELAY_CONFIG", default_value = "chainrelay.yaml")]
        config: PathBuf,
    },

    /// Validate a config, load its ABIs and print the resolved subscriptions
    #[command(name = "check-config")]
    CheckConfig {
        #[arg(short, long, env = "CHAINRELAY_CONFIG", default_value = "chainrelay.yaml")]
        config: PathBuf,
    },

    /// Decode and normalize one log offline, print the record as JSON
    #[command(name = "decode-log")]
    DecodeLog {
        /// ABI JSON file (array or artifact form)
        #[arg(long)]
        abi: PathBuf,
        /// topics[0] = event signature hash, topics[1..] = indexed params
        #[arg(long, num_args = 1..)]
        topics: Vec<String>,
        /// Non-indexed params (hex, 0x-prefixed)
        #[arg(long, default_value = "0x")]
        data: String,
        /// Emitting contract
        #[arg(long, default_value = "0x0000000000000000000000000000000000000000")]
        address: String,
        #[arg(long, default_value = "0x0000000000000000000000000000000000000000000000000000000000000000")]
        tx_hash: String,
        #[arg(long, default_value_t = 0)]
        log_index: u64,
        #[arg(long, default_value_t = 0)]
        block_number: u64,
        #[arg(long, default_value_t = 80_002)]
        chain_id: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let result: Result<()> = match cli.command {
        Commands::Run { config } => cmd_run::run(&config).await,
        Commands::CheckConfig { config } => cmd_check::run(&config),
        Commands::DecodeLog {
            abi,
            topics,
            data,
            address,
            tx_hash,
            log_index,
            block_number,
            chain_id,
        } => cmd_decode::run(cmd_decode::DecodeArgs {
            abi,
            topics,
            data,
            address,
            tx_hash,
            log_index,
            block_number,
            chain_id,
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("✗ {e:#}");
            ExitCode::FAILURE
        }
    }
}

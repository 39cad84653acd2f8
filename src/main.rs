use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use token_tracker::{
    Error,
    codec::{BitcoinAddressCodec, Network},
    query::TokenTracker,
    serve::{
        self, AppState, ServerConfig,
        routes::{addresses, tokens, transactions},
        types::{PageParams, UtxoParams},
    },
    storage::{self, kv_store::StorageHandler},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();

    let config = Config::new(&args.config)?;

    info!("running token tracker with config: {config:?}");

    let storage = StorageHandler::open(&config.storage)?;
    let codec = Arc::new(BitcoinAddressCodec::new(config.network));
    let tracker = TokenTracker::new(storage, codec, config.catalog_cache_entries);

    match args.command {
        Command::Serve => serve::run(tracker, &config.server).await,
        Command::Query(query) => run_query(Arc::new(tracker), query).await,
    }
}

/// Answers a single query through the same handlers as the server and prints the JSON body.
async fn run_query(state: AppState, query: QueryCommand) -> Result<(), Error> {
    let page = |offset, limit| PageParams { offset, limit };

    let resp = match query {
        QueryCommand::Tip => {
            let ctx = state.start_query()?;
            serde_json::json!({ "processed_height": ctx.watermark().height() })
                .to_string()
                .into_response()
        }
        QueryCommand::Tokens { offset, limit } => {
            tokens::tokens_all(State(state), Query(page(offset, limit)))
                .await
                .into_response()
        }
        QueryCommand::Token { token } => tokens::tokens_info(State(state), Path(token))
            .await
            .into_response(),
        QueryCommand::Supply { token } => tokens::tokens_supply(State(state), Path(token))
            .await
            .into_response(),
        QueryCommand::Rankings { offset, limit } => {
            tokens::tokens_rankings(State(state), Query(page(offset, limit)))
                .await
                .into_response()
        }
        QueryCommand::Utxos {
            address,
            token,
            offset,
            limit,
        } => addresses::addresses_utxos(
            State(state),
            Query(UtxoParams {
                offset,
                limit,
                token,
            }),
            Path(address),
        )
        .await
        .into_response(),
        QueryCommand::Balances { address } => {
            addresses::addresses_balances(State(state), Path(address))
                .await
                .into_response()
        }
        QueryCommand::Balance { address, token } => {
            addresses::addresses_token_balance(State(state), Path((address, token)))
                .await
                .into_response()
        }
        QueryCommand::History {
            address,
            token,
            offset,
            limit,
        } => addresses::addresses_token_history(
            State(state),
            Query(page(offset, limit)),
            Path((address, token)),
        )
        .await
        .into_response(),
        QueryCommand::StateHashes { txid } => {
            transactions::transactions_state_hashes(State(state), Path(txid))
                .await
                .into_response()
        }
    };

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .map_err(|e| Error::Custom(format!("unable to read response: {e}")))?;

    println!("{}", String::from_utf8_lossy(&bytes));

    Ok(())
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API
    Serve,
    /// Run a single query and print the result
    #[command(subcommand)]
    Query(QueryCommand),
}

#[derive(Debug, Subcommand)]
enum QueryCommand {
    Tip,
    Tokens {
        #[arg(long)]
        offset: Option<usize>,
        #[arg(long)]
        limit: Option<usize>,
    },
    Token {
        token: String,
    },
    Supply {
        token: String,
    },
    Rankings {
        #[arg(long)]
        offset: Option<usize>,
        #[arg(long)]
        limit: Option<usize>,
    },
    Utxos {
        address: String,
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        offset: Option<usize>,
        #[arg(long)]
        limit: Option<usize>,
    },
    Balances {
        address: String,
    },
    Balance {
        address: String,
        token: String,
    },
    History {
        address: String,
        token: String,
        #[arg(long)]
        offset: Option<usize>,
        #[arg(long)]
        limit: Option<usize>,
    },
    StateHashes {
        txid: String,
    },
}

#[derive(Debug, Parser)]
#[clap(name = "token-tracker")]
#[clap(bin_name = "token-tracker")]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,
}

fn default_catalog_cache_entries() -> u64 {
    10_000
}

#[derive(Deserialize, Debug)]
pub struct Config {
    pub storage: storage::Config,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub network: Network,
    /// Number of token metadata records kept in memory
    #[serde(default = "default_catalog_cache_entries")]
    pub catalog_cache_entries: u64,
}

impl Config {
    pub fn new(config_path: &Option<std::path::PathBuf>) -> Result<Self, config::ConfigError> {
        let mut s = config::Config::builder();

        s = s.add_source(config::File::with_name("tracker.toml").required(false));

        if let Some(explicit) = config_path.as_ref().and_then(|x| x.to_str()) {
            s = s.add_source(config::File::with_name(explicit).required(true));
        }

        s = s.add_source(
            config::Environment::with_prefix("TRACKER")
                .prefix_separator("_")
                .separator("__"),
        );

        s.build()?.try_deserialize()
    }
}

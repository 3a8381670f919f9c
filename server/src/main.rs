//! FlagSearch entry point
//!
//! Builds the search engine once from the feature files, then either answers
//! a single command or serves JSON-RPC over stdio:
//! - `search <territory>`: top-k similar flags per model
//! - `territories` / `models`: what the engine has loaded
//! - `serve`: JSON-RPC 2.0 query server for a UI collaborator

use clap::{Parser, Subcommand, ValueEnum};
use flagsearch_core::{EngineConfig, KnnAlgorithm, SearchEngine, SearchMethod};
use flagsearch_server::error::ServerResult;
use flagsearch_server::output::{self, SearchResponse};
use flagsearch_server::rpc::RpcServer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "flagsearch")]
#[command(about = "Flag image similarity search over pretrained CNN features")]
#[command(version)]
struct Args {
    /// Glob pattern matching one feature CSV per model
    #[arg(
        long,
        short,
        global = true,
        env = "FLAGSEARCH_FEATURES",
        default_value = "data/*.csv"
    )]
    features: String,

    /// Results returned per model
    #[arg(
        long = "top-k",
        short = 'k',
        global = true,
        env = "FLAGSEARCH_TOP_K",
        default_value_t = 10
    )]
    top_k: usize,

    /// Nearest-neighbour strategy for the knn method
    #[arg(long, global = true, value_enum, default_value_t = Algorithm::Exact)]
    algorithm: Algorithm,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find the flags most similar to a territory's flag
    Search {
        /// Territory name, e.g. "France"
        territory: String,

        /// "knn" or "cosine"
        #[arg(long, short, default_value = "cosine")]
        method: String,

        /// Output results as JSON
        #[arg(long)]
        json: bool,

        /// Thumbnail directory used to print asset paths
        #[arg(long)]
        images: Option<PathBuf>,
    },
    /// List territories sorted by name
    Territories {
        #[arg(long)]
        json: bool,
    },
    /// List loaded models
    Models {
        #[arg(long)]
        json: bool,
    },
    /// Serve JSON-RPC 2.0 over stdio
    Serve,
}

#[derive(Clone, Copy, ValueEnum)]
enum Algorithm {
    Exact,
    Hnsw,
}

impl From<Algorithm> for KnnAlgorithm {
    fn from(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Exact => KnnAlgorithm::Exact,
            Algorithm::Hnsw => KnnAlgorithm::Hnsw,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Logs go to stderr so stdout carries only results
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "flagsearch=info,flagsearch_server=info,flagsearch_core=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(args).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> ServerResult<()> {
    let config = EngineConfig::new(args.features)
        .with_k(args.top_k)
        .with_algorithm(args.algorithm.into());
    let engine = SearchEngine::build(&config)?;

    match args.command {
        Command::Search {
            territory,
            method,
            json,
            images,
        } => {
            let method: SearchMethod = method.parse()?;
            let results = engine.search(&territory, method)?;
            let response = SearchResponse {
                territory: &territory,
                method,
                k: engine.k(),
                results: &results,
            };
            if json {
                println!("{}", output::format_json(&response)?);
            } else {
                print!("{}", output::format_human(&response, images.as_deref()));
            }
        }
        Command::Territories { json } => {
            let territories = engine.territories();
            if json {
                println!("{}", serde_json::to_string_pretty(&territories)?);
            } else {
                print!("{}", output::format_territories(&territories));
            }
        }
        Command::Models { json } => {
            let models = engine.models();
            if json {
                println!("{}", serde_json::to_string_pretty(&models)?);
            } else {
                print!("{}", output::format_models(&models));
            }
        }
        Command::Serve => {
            tracing::info!("Starting FlagSearch query server");
            RpcServer::new(Arc::new(engine)).run_stdio().await?;
        }
    }

    Ok(())
}

//! API Replay CLI

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use api_replay::config::{Config, DEFAULT_CONFIG_FILE};
use api_replay::inspect::render_artifact;
use api_replay::network::{NetworkHandler, UpstreamClient};
use api_replay::recording::{parse_header, RecordRequest, RecordingEngine};
use api_replay::replay::ReplayEngine;
use api_replay::storage::read_artifact;

#[derive(Parser, Debug)]
#[command(
    name = "api-replay",
    version,
    about = "Record API calls and replay them from disk for demos and tests"
)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record an API response and save it under the output directory
    Record {
        /// URL to fetch
        url: String,
        /// Output directory (overrides the configured one)
        output: Option<PathBuf>,
        /// Output directory (takes precedence over the positional argument)
        #[arg(short = 'O', long = "output")]
        output_dir: Option<PathBuf>,
        /// Base URL to strip from the request path when saving
        #[arg(short = 'B', long)]
        base_url: Option<String>,
        /// Custom header, e.g. -H 'Authorization: Bearer ...'
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
    /// Print a recorded response
    Replay {
        /// Path to the artifact file
        input: Option<PathBuf>,
        /// Path to the artifact file (takes precedence over the positional argument)
        #[arg(short = 'I', long = "input")]
        input_file: Option<PathBuf>,
    },
    /// Serve recorded responses over HTTP
    Serve {
        /// Directory to serve (defaults to the configured output directory)
        dir: Option<PathBuf>,
        /// Directory to serve (takes precedence over the positional argument)
        #[arg(short = 'D', long = "from-dir")]
        from_dir: Option<PathBuf>,
        /// Port to serve on (defaults to the configured port)
        #[arg(short = 'P', long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "api_replay=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Record {
            url,
            output,
            output_dir,
            base_url,
            headers,
        } => {
            let config = load_config(&cli.config)?;

            let headers = headers
                .iter()
                .map(|h| parse_header(h))
                .collect::<api_replay::Result<Vec<_>>>()?;

            let request = RecordRequest {
                url: url.clone(),
                output_dir: output_dir.or(output).unwrap_or(config.output_dir),
                base_url,
                headers,
            };

            let client = UpstreamClient::new(config.limits.max_response_size)?;
            let outcome = RecordingEngine::new(client)
                .record(&request)
                .await
                .with_context(|| format!("failed recording {url}"))?;

            println!("Recorded {url} -> {}", outcome.path.display());
        }
        Commands::Replay { input, input_file } => {
            let input = input_file
                .or(input)
                .context("missing input file path: use --input or pass it as the first argument")?;

            let artifact = read_artifact(&input)
                .with_context(|| format!("failed reading {}", input.display()))?;

            print!("{}", render_artifact(&artifact));
        }
        Commands::Serve {
            dir,
            from_dir,
            port,
        } => {
            let config = load_config(&cli.config)?;
            let dir = from_dir.or(dir).unwrap_or(config.output_dir);
            let port = port.unwrap_or(config.port);

            let engine = ReplayEngine::build(&dir)
                .with_context(|| format!("failed indexing {}", dir.display()))?;

            info!(
                "Serving {} cached responses from {} on http://localhost:{}",
                engine.table().len(),
                engine.root().display(),
                port
            );

            let engine = Arc::new(engine);
            NetworkHandler::new(Arc::clone(&engine), port, config.limits.max_connections)
                .run()
                .await
                .with_context(|| format!("failed serving on port {port}"))?;

            let stats = engine.stats();
            info!(
                "Served {} hits, {} misses, {} failures ({:.1}% hit rate)",
                stats.hits,
                stats.misses,
                stats.failures,
                stats.hit_rate() * 100.0
            );
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::from_file(path).context("failed loading config")
}

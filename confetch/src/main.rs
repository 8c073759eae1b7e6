mod config;
mod logging;
mod telemetry;

use clap::{Parser, Subcommand};
use config::Config;
use resolver::cache_key::CacheKey;
use resolver::{BuildError, Credentials, ResolutionResult, ResolveError, Resolver};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(version, about = "Resolve the remote configuration for an authorization")]
struct Cli {
    /// Path to the YAML config file, defaults apply when omitted.
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Resolve the configuration and print it as JSON.
    Resolve {
        /// Tokenization key or client token.
        #[arg(long, env = "CONFETCH_AUTHORIZATION")]
        authorization: String,
    },
    /// Print the cache key the configuration would be stored under.
    CacheKey {
        #[arg(long, env = "CONFETCH_AUTHORIZATION")]
        authorization: String,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("could not build resolver: {0}")]
    Build(#[from] BuildError),
    #[error("{0}")]
    Resolve(#[from] ResolveError),
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("could not serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config from {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    logging::init(&config.common.logging);

    if let Some(metrics_config) = &config.common.metrics
        && let Err(e) = telemetry::init(metrics_config)
    {
        tracing::warn!(error = %e, "metrics disabled");
    }

    let output = match cli.command {
        CliCommand::Resolve { authorization } => resolve(&config, &authorization).await,
        CliCommand::CacheKey { authorization } => cache_key(&authorization).map(|k| k.to_string()),
    };

    match output {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn resolve(config: &Config, authorization: &str) -> Result<String, CliError> {
    let resolver = resolver::build_resolver(&config.resolver)?;
    let credentials = Credentials::from_authorization(authorization);

    let resolution = match resolver.resolve(&credentials).await {
        ResolutionResult::Resolved(resolution) => resolution,
        ResolutionResult::Failed(e) => return Err(e.into()),
    };

    if let Some(e) = &resolution.load_from_cache_error {
        tracing::warn!(error = %e, "configuration cache could not be read");
    }
    if let Some(e) = &resolution.save_to_cache_error {
        tracing::warn!(error = %e, "configuration cache could not be written");
    }
    tracing::info!(source = ?resolution.source, "configuration resolved");

    Ok(serde_json::to_string_pretty(&resolution.configuration)?)
}

fn cache_key(authorization: &str) -> Result<CacheKey, CliError> {
    match Credentials::from_authorization(authorization) {
        Credentials::Valid(authorization) => Ok(Resolver::cache_key(&authorization)),
        Credentials::Invalid { reason } => Err(CliError::InvalidCredentials(reason)),
    }
}

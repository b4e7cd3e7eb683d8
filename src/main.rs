use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use maintainer::config::MaintainerConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "maintainer")]
#[command(
    version,
    about = "Fork a repository, apply sandboxed fixes and propose them upstream"
)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to ./maintainer.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the job API over HTTP
    Serve {
        /// Interface to bind (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one maintenance pipeline in the foreground
    Run {
        /// Upstream repository, e.g. github.com/owner/repo
        repo_url: String,
    },
    /// Validate configuration and print a redacted summary
    CheckConfig,
}

fn init_logging(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_logging(cli.verbose, cli.log_format);

    let config =
        MaintainerConfig::resolve(cli.config.as_deref()).context("Failed to load configuration")?;

    match &cli.command {
        Commands::Serve { host, port } => {
            cmd::cmd_serve(config, host.clone(), *port).await?;
        }
        Commands::Run { repo_url } => {
            cmd::cmd_run(config, repo_url).await?;
        }
        Commands::CheckConfig => {
            cmd::cmd_check_config(&config, cli.config.as_deref())?;
        }
    }

    Ok(())
}

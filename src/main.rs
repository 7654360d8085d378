use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use simplisync::app;
use simplisync::config::{default_config_path, Config};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "simplisync")]
#[command(about = "Fetch account data from Simplifi Money")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT_HASH"), ")"))]
struct Cli {
    /// Path to config file.
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Run the browser without a visible window.
    #[arg(long)]
    headless: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and print account data as JSON.
    Accounts {
        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,

        /// Quicken ID to sign in with.
        #[arg(long)]
        username: Option<String>,
    },
    /// Sign in interactively and persist the browser session.
    Login {
        /// Quicken ID to sign in with.
        #[arg(long)]
        username: Option<String>,
    },
    /// Show the resolved configuration.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "info,chromiumoxide=warn,chromiumoxide::conn=off,chromiumoxide::handler=off",
            )
        }))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;

    if cli.headless {
        config.chrome.headless = true;
    }

    let config_dir = cli
        .config
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    config.chrome.profile_dir = config.resolve_profile_dir(config_dir);

    match cli.command {
        Command::Accounts { pretty, username } => {
            let accounts = app::accounts(&config, username).await?;
            let output = serde_json::Value::Array(accounts);
            if pretty {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("{}", serde_json::to_string(&output)?);
            }
        }
        Command::Login { username } => {
            app::login(&config, username).await?;
        }
        Command::Config => {
            app::show_config(&cli.config, &config);
        }
    }

    Ok(())
}

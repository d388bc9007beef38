mod commands;
mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "probe-agent")]
#[command(about = "Metrics agent that scrapes a database service through bounded concurrent collectors", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Write logs to daily rotated files in this directory instead of stderr
    #[arg(long, global = true, env = "PROBE_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve metrics over HTTP
    Serve {
        /// Path to agent config file (YAML, TOML, or JSON)
        config_file: PathBuf,

        /// Override the configured listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Run a single scrape and print the result
    Scrape {
        /// Path to agent config file
        config_file: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate an agent config file
    Validate {
        /// Path to agent config file
        config_file: PathBuf,
    },

    /// List available collectors
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));

    // Dropping the guard flushes buffered file logs, so it lives until exit.
    let _guard = match &cli.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "probe-agent.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    };

    match cli.command {
        Commands::Serve {
            config_file,
            listen,
        } => {
            commands::serve::execute(config_file, listen).await?;
        }

        Commands::Scrape {
            config_file,
            format,
            output,
        } => {
            commands::scrape::execute(config_file, format, output).await?;
        }

        Commands::Validate { config_file } => {
            commands::validate::execute(config_file).await?;
        }

        Commands::List => {
            commands::list::execute().await?;
        }
    }

    Ok(())
}

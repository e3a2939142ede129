//! safe-fetch
//!
//! Serve files from a confined storage root, as a download endpoint would.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use download::FileAccess;
use fetcher::config::{Config, LoggingConfig};
use fetcher::transport::{exit_code_for, sha256_hex, stream_range, ByteRange, ResponseHead};
use serde::Serialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// safe-fetch - serve files from a storage root without leaking anything else.
#[derive(Parser, Debug)]
#[command(name = "safe-fetch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Stream a file from the storage root
    Fetch {
        /// Requested file name
        name: String,

        /// Write to this file instead of stdout
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,

        /// First byte to send
        #[arg(long)]
        offset: Option<u64>,

        /// Number of bytes to send
        #[arg(long)]
        length: Option<u64>,
    },

    /// Show the response a request would get, without the body
    Check {
        /// Requested file name
        name: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,

        /// Include the SHA-256 of the served bytes
        #[arg(long)]
        checksum: bool,
    },

    /// Print the effective configuration
    Config {
        /// Print the built-in defaults instead
        #[arg(long)]
        default: bool,
    },
}

/// Output of the `check` command.
#[derive(Debug, Serialize)]
struct CheckReport {
    #[serde(flatten)]
    head: ResponseHead,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha256: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    // Apply environment variable overrides
    config.apply_env_overrides();

    // Initialize tracing
    let guard = init_tracing(&config.logging, cli.verbose)?;
    if let Some(path) = &cli.config {
        tracing::debug!("Using config file: {:?}", path);
    }

    let code = run(cli.command, config).await?;
    if code != 0 {
        // Flush the log writer before leaving without unwinding.
        drop(guard);
        std::process::exit(code);
    }

    Ok(())
}

/// Set up the global subscriber. Logs go to stderr unless a log file is set,
/// so stdout stays free for file bytes.
fn init_tracing(logging: &LoggingConfig, verbose: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match &logging.file {
        Some(path) => {
            let file = open_log_file(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

fn open_log_file(path: &Path) -> anyhow::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))
}

/// Execute a command. Returns the process exit code.
async fn run(command: Commands, config: Config) -> anyhow::Result<i32> {
    match command {
        Commands::Fetch {
            name,
            output,
            offset,
            length,
        } => {
            let access = FileAccess::new(config.policy()?);

            let file = match access.open(&name).await.into_result() {
                Ok(file) => file,
                Err(rejection) => {
                    eprintln!("{} {}", rejection.status_code(), rejection.message);
                    return Ok(exit_code_for(rejection.status_code()));
                }
            };

            let range = ByteRange::new(offset.unwrap_or(0), length, file.size)?;
            let mut handle = file.handle;

            let written = match &output {
                Some(path) => {
                    let mut out = tokio::fs::File::create(path)
                        .await
                        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
                    stream_range(&mut handle, range, &mut out).await?
                }
                None => {
                    let mut out = tokio::io::stdout();
                    stream_range(&mut handle, range, &mut out).await?
                }
            };

            tracing::info!(
                name = %file.display_name,
                bytes = written,
                offset = range.start,
                "Fetch complete"
            );
            Ok(0)
        }
        Commands::Check {
            name,
            json,
            checksum,
        } => {
            let access = FileAccess::new(config.policy()?);

            let report = match access.open(&name).await.into_result() {
                Ok(mut file) => {
                    let sha256 = if checksum {
                        Some(sha256_hex(&mut file.handle).await?)
                    } else {
                        None
                    };
                    CheckReport {
                        head: ResponseHead::for_file(&file),
                        sha256,
                    }
                }
                Err(rejection) => CheckReport {
                    head: ResponseHead::for_rejection(&rejection),
                    sha256: None,
                },
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.head);
                if let Some(digest) = &report.sha256 {
                    println!("SHA-256: {}", digest);
                }
            }

            Ok(exit_code_for(report.head.status))
        }
        Commands::Config { default } => {
            let shown = if default {
                Config::default()
            } else {
                let policy = config.policy()?;
                config.effective(&policy)
            };
            print!("{}", shown.to_toml()?);
            Ok(0)
        }
    }
}

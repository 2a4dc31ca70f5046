//! backupstore operator CLI entry point.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use backupstore_remote_storage::Url;

/// Inspect and populate cdn3 backup media storage.
#[derive(Debug, Parser)]
#[command(name = "backupstore", version, about)]
struct Cli {
    /// Configuration file (defaults to the platform config path).
    #[arg(long, global = true, env = "BACKUPSTORE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List objects under a prefix.
    List {
        #[arg(long)]
        prefix: String,

        /// Cursor returned by a previous page.
        #[arg(long, conflicts_with = "all")]
        cursor: Option<String>,

        /// Page size (defaults to `default_limit` from the config).
        #[arg(long)]
        limit: Option<u64>,

        /// Follow cursors until the last page.
        #[arg(long)]
        all: bool,
    },

    /// Show object count and bytes used under a prefix.
    Usage {
        #[arg(long)]
        prefix: String,
    },

    /// Copy a CDN object into cdn3, encrypting it in transit.
    Copy {
        /// Source object URL.
        #[arg(long)]
        source: Url,

        /// Expected plaintext length of the source, in bytes.
        #[arg(long)]
        length: u64,

        /// Pre-signed tus upload location.
        #[arg(long)]
        upload_location: String,

        /// CDN the upload descriptor was issued for.
        #[arg(long, default_value_t = 3)]
        cdn: u32,

        /// Upload header as `name=value`; repeatable.
        #[arg(long = "header", value_parser = commands::parse_header)]
        headers: Vec<(String, String)>,

        /// Base64 encryption key (32 bytes). Generated when omitted.
        #[arg(long, requires = "nonce")]
        key: Option<String>,

        /// Base64 nonce prefix (8 bytes).
        #[arg(long, requires = "key")]
        nonce: Option<String>,
    },

    /// Decrypt a downloaded object.
    Decrypt {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,

        /// Base64 encryption key (32 bytes).
        #[arg(long)]
        key: String,

        /// Base64 nonce prefix (8 bytes).
        #[arg(long)]
        nonce: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    backupstore_remote_storage::instrumentation::describe_metrics();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Decrypt {
            input,
            output,
            key,
            nonce,
        } => commands::decrypt(&input, &output, &key, &nonce),

        Command::List {
            prefix,
            cursor,
            limit,
            all,
        } => {
            let config = config::Config::load(cli.config.as_deref())?;
            let manager = commands::manager(&config)?;
            let limit = limit.unwrap_or(config.default_limit);
            if all {
                let entries = commands::list_all(&manager, &prefix, limit).await?;
                commands::print_entries(&entries);
            } else {
                commands::list_page(&manager, &prefix, cursor, limit).await?;
            }
            Ok(())
        }

        Command::Usage { prefix } => {
            let config = config::Config::load(cli.config.as_deref())?;
            let manager = commands::manager(&config)?;
            commands::usage(&manager, &prefix).await
        }

        Command::Copy {
            source,
            length,
            upload_location,
            cdn,
            headers,
            key,
            nonce,
        } => {
            let config = config::Config::load(cli.config.as_deref())?;
            let manager = commands::manager(&config)?;
            let params = commands::copy_parameters(key.as_deref(), nonce.as_deref())?;
            let descriptor = backupstore_remote_storage::UploadDescriptor {
                cdn,
                signed_upload_location: upload_location,
                headers: headers.into_iter().collect(),
            };
            commands::copy(&manager, source, length, params, descriptor).await
        }
    }
}

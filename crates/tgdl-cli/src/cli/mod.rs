//! CLI for the tgdl media downloader.

mod commands;
mod control_socket;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tgdl_core::config::{self, TgdlConfig};
use tgdl_core::link::DirectorySource;
use tgdl_core::media::SourceInfo;
use tgdl_core::registry::TaskId;
use tgdl_core::session::Session;

use commands::{
    run_cancel, run_clear, run_files, run_get, run_list, run_retry, run_sources, run_status,
    GetOptions,
};

/// Top-level CLI for tgdl.
#[derive(Debug, Parser)]
#[command(name = "tgdl")]
#[command(about = "tgdl: concurrent media downloader for channel archives", long_about = None)]
pub struct Cli {
    /// Source root (one subdirectory per channel); overrides `source_dir`.
    #[arg(long, global = true, value_name = "DIR")]
    pub source_dir: Option<PathBuf>,

    /// Download root; overrides `download_dir`.
    #[arg(long, global = true, value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// List available sources (channels, groups).
    Sources {
        #[arg(long, default_value = "100")]
        limit: usize,
    },

    /// List media items of a source.
    List {
        /// Source name or id.
        #[arg(allow_negative_numbers = true)]
        source: String,
        /// Number of recent messages to scan.
        #[arg(long, default_value = "50")]
        limit: usize,
        /// Include media posted in comment threads.
        #[arg(long)]
        related: bool,
        /// Ignore the listing cache.
        #[arg(long)]
        refresh: bool,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Download items from a source and show progress until all finish.
    Get {
        /// Source name or id.
        #[arg(allow_negative_numbers = true)]
        source: String,
        /// Item ids; everything listed is downloaded if none are given.
        items: Vec<i64>,
        /// Number of recent messages to scan when no ids are given.
        #[arg(long, default_value = "50")]
        limit: usize,
        /// Include media posted in comment threads.
        #[arg(long)]
        related: bool,
        /// Override `max_concurrent`.
        #[arg(short = 'j', long, value_name = "N")]
        jobs: Option<usize>,
    },

    /// Show tasks of the running `tgdl get`.
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Cancel a task of the running `tgdl get` (`<source_id>:<item_id>`).
    Cancel {
        #[arg(allow_hyphen_values = true)]
        task: TaskId,
    },

    /// Retry a finished task of the running `tgdl get`.
    Retry {
        #[arg(allow_hyphen_values = true)]
        task: TaskId,
    },

    /// Drop finished tasks from the running `tgdl get` (all if none given).
    Clear {
        #[arg(allow_hyphen_values = true)]
        tasks: Vec<TaskId>,
    },

    /// List downloaded files.
    Files,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let mut cfg = config::load_or_init()?;
        if let Some(dir) = cli.source_dir {
            cfg.source_dir = Some(dir);
        }
        if let Some(dir) = cli.download_dir {
            cfg.download_dir = Some(dir);
        }
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Sources { limit } => run_sources(&cfg, limit).await?,
            CliCommand::List {
                source,
                limit,
                related,
                refresh,
                json,
            } => run_list(&cfg, &source, limit, related, refresh, json).await?,
            CliCommand::Get {
                source,
                items,
                limit,
                related,
                jobs,
            } => {
                if let Some(n) = jobs {
                    cfg.max_concurrent = n;
                }
                let opts = GetOptions {
                    source,
                    items,
                    limit,
                    related,
                };
                run_get(&cfg, &opts).await?;
            }
            CliCommand::Status { json } => run_status(json).await?,
            CliCommand::Cancel { task } => run_cancel(task).await?,
            CliCommand::Retry { task } => run_retry(task).await?,
            CliCommand::Clear { tasks } => run_clear(&tasks).await?,
            CliCommand::Files => run_files(&cfg)?,
        }

        Ok(())
    }
}

/// Starts a session over the configured source directory.
pub(crate) async fn open_session(cfg: &TgdlConfig) -> Result<Session> {
    let root = cfg
        .source_dir
        .clone()
        .context("no source directory; set source_dir in config.toml or pass --source-dir")?;
    let client = DirectorySource::new(root).with_related_limit(cfg.related_scan_limit);
    let session = Session::start(Box::new(client), cfg, cfg.thumbnail_dir()?).await?;
    Ok(session)
}

/// Looks a source up by name or id.
pub(crate) async fn find_source(session: &Session, query: &str) -> Result<SourceInfo> {
    session
        .scheduler
        .catalog()
        .find_source(query)
        .await?
        .with_context(|| format!("source not found: {query}"))
}

#[cfg(test)]
mod tests;

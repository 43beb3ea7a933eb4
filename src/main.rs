//! Page-Lens main entry point
//!
//! This is the command-line interface for the Page-Lens page analyzer.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use page_lens::config::{load_config, Config};
use page_lens::crawler::Coordinator;
use page_lens::hub::{CrawlEvent, EventHub, MessageSink, WriterSink};
use page_lens::output::{print_job_detail, print_job_table};
use page_lens::storage::{JobId, JobQuery, JobSort, SortOrder, SqliteStorage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

/// Page-Lens: a single-page web analyzer
///
/// Page-Lens fetches submitted pages, reports their structure (title, markup
/// version, headings, links, login forms) and checks every outbound link.
#[derive(Parser, Debug)]
#[command(name = "page-lens")]
#[command(version)]
#[command(about = "A single-page web analyzer", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a page for analysis
    Add {
        url: String,
        #[arg(long)]
        owner: String,
    },

    /// List an owner's jobs
    List {
        #[arg(long)]
        owner: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        limit: u32,
        /// created_at, updated_at, url, title or status
        #[arg(long, default_value = "created_at")]
        sort: JobSort,
        /// asc or desc
        #[arg(long, default_value = "desc")]
        order: SortOrder,
        /// Match against URL or page title
        #[arg(long)]
        search: Option<String>,
    },

    /// Show one job with its analysis result
    Show {
        id: JobId,
        #[arg(long)]
        owner: String,
    },

    /// Start a queued job and stream its events
    Run {
        id: JobId,
        #[arg(long)]
        owner: String,
    },

    /// Reset a job and analyze it again, streaming its events
    Rerun {
        id: JobId,
        #[arg(long)]
        owner: String,
    },

    /// Reset a job to queued
    Stop {
        id: JobId,
        #[arg(long)]
        owner: String,
    },

    /// Delete jobs
    Delete {
        #[arg(required = true)]
        ids: Vec<JobId>,
        #[arg(long)]
        owner: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .with_context(|| format!("failed to open database {}", config.output.database_path))?;
    let hub = EventHub::new(&config.hub);
    let coordinator = Coordinator::new(&config, storage, hub)?;

    match cli.command {
        Command::Add { url, owner } => {
            let job = coordinator.create_job(&owner, &url)?;
            println!("{}", job.id);
        }

        Command::List {
            owner,
            page,
            limit,
            sort,
            order,
            search,
        } => {
            let query = JobQuery {
                page,
                page_size: limit,
                sort,
                order,
                search,
            };
            let jobs = coordinator.list_jobs(&owner, &query)?;
            print_job_table(&jobs, &query);
        }

        Command::Show { id, owner } => {
            let job = coordinator.get_job(&owner, id)?;
            print_job_detail(&job);
        }

        Command::Run { id, owner } => {
            stream_execution(&config, &coordinator, &owner, |c| c.start_job(&owner, id)).await?;
        }

        Command::Rerun { id, owner } => {
            stream_execution(&config, &coordinator, &owner, |c| c.rerun_job(&owner, id)).await?;
        }

        Command::Stop { id, owner } => {
            coordinator.stop_job(&owner, id)?;
            println!("Job {} reset to queued", id);
        }

        Command::Delete { ids, owner } => {
            let deleted = coordinator.delete_jobs(&owner, &ids)?;
            println!("Deleted {} of {} jobs", deleted, ids.len());
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr so stdout carries only command output and events.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("page_lens=info,warn"),
            1 => EnvFilter::new("page_lens=debug,info"),
            2 => EnvFilter::new("page_lens=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Subscribes as `owner`, launches an execution and prints its events as JSON
/// lines until the terminal one arrives
async fn stream_execution<F>(
    config: &Config,
    coordinator: &Coordinator<SqliteStorage>,
    owner: &str,
    launch: F,
) -> Result<()>
where
    F: FnOnce(&Coordinator<SqliteStorage>) -> page_lens::Result<JoinHandle<()>>,
{
    let (tx, mut rx) = mpsc::channel::<Arc<str>>(config.hub.subscriber_queue_capacity.max(1));
    let subscription = coordinator.hub().subscribe(owner, tx).await?;

    let execution = launch(coordinator)?;

    let mut stdout = WriterSink::stdout();
    while let Some(message) = rx.recv().await {
        stdout.deliver(Arc::clone(&message)).await?;

        match serde_json::from_str::<CrawlEvent>(&message) {
            Ok(event) if event.is_terminal() => break,
            Ok(_) => {}
            Err(e) => tracing::warn!("Unreadable event: {}", e),
        }
    }

    execution.await.context("analysis task panicked")?;
    coordinator.hub().unsubscribe(subscription).await?;

    Ok(())
}

//! TSN Ingest - source ingestion tool

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tracing::{error, info, warn};
use tsn_common::logging::{init_logging, LogConfig, LogLevel};
use tsn_common::StreamId;
use tsn_ingest::argentina::{sepa_spec, SepaFetcher};
use tsn_ingest::github::GithubCsvSource;
use tsn_ingest::gsheet::{sheet_spec, GsheetFetcher};
use tsn_ingest::sources::SourceType;
use tsn_pipeline::{HttpTsnClient, PipelineRunner, RunOutcome, RunSummary};

#[derive(Parser, Debug)]
#[command(name = "tsn-ingest")]
#[command(author, version, about = "TSN data ingestion tool")]
struct Cli {
    /// Data source to ingest
    #[command(subcommand)]
    source: Source,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Source {
    /// Ingest one stream from a Google Sheet
    Gsheet {
        /// Sheet document id
        #[arg(long)]
        sheet_id: String,

        /// Source id filter within the sheet (ID column)
        #[arg(long)]
        source_id: String,

        /// Target stream id; derived from --stream-name when omitted
        #[arg(long, conflicts_with = "stream_name")]
        stream_id: Option<StreamId>,

        /// Human-readable stream name to derive the stream id from
        #[arg(long)]
        stream_name: Option<String>,
    },

    /// Ingest one day of Argentina SEPA prices
    Sepa {
        /// Upload date (YYYY-MM-DD); latest when omitted
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Ingest every stream listed in a primitive sources file on GitHub
    RunSources {
        /// Repository as owner/name
        #[arg(long)]
        repo: String,

        /// Path to the primitive sources CSV within the repository
        #[arg(long, default_value = "primitive_sources.csv")]
        path: String,

        /// Branch to read from
        #[arg(long, default_value = "main")]
        branch: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging based on verbose flag
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("tsn-ingest".to_string())
        .build();

    // Environment variables override individual fields but keep CLI-derived
    // settings for everything left unset.
    let log_config = log_config.apply_env().context("logging configuration")?;

    init_logging(&log_config)?;

    let client = Arc::new(HttpTsnClient::from_env().context("TSN client configuration")?);
    let runner = PipelineRunner::new(client);

    let summaries = match cli.source {
        Source::Gsheet { sheet_id, source_id, stream_id, stream_name } => {
            let stream_id = match (stream_id, stream_name) {
                (Some(id), _) => id,
                (None, Some(name)) => StreamId::generate(&name),
                (None, None) => bail!("either --stream-id or --stream-name is required"),
            };

            let spec = sheet_spec(&format!("gsheet:{}", sheet_id), stream_id, &source_id);
            let fetcher = GsheetFetcher::new(&sheet_id)?;
            vec![runner.run(&spec, &fetcher).await]
        },
        Source::Sepa { date } => {
            let mut fetcher = SepaFetcher::new()?;
            if let Some(date) = date {
                fetcher = fetcher.for_date(date);
            }
            vec![runner.run(&sepa_spec(), &fetcher).await]
        },
        Source::RunSources { repo, path, branch } => {
            run_primitive_sources(&runner, &repo, &path, &branch).await?
        },
    };

    let mut failed = false;
    for summary in &summaries {
        log_summary(summary);
        failed |= summary.outcome == RunOutcome::Failed;
    }

    if failed {
        bail!("one or more pipeline runs failed");
    }
    Ok(())
}

/// Run every stream listed in the repository's primitive sources file
async fn run_primitive_sources(
    runner: &PipelineRunner,
    repo: &str,
    path: &str,
    branch: &str,
) -> Result<Vec<RunSummary>> {
    let token = std::env::var("GITHUB_TOKEN").ok();
    let table = GithubCsvSource::new(repo, path, branch, token.as_deref())?;
    let sources = table.load_primitive_sources().await?;
    info!(repo = %repo, count = sources.len(), "Loaded primitive sources");

    let mut summaries = Vec::with_capacity(sources.len());
    for source in sources {
        match source.source_type() {
            Ok(SourceType::Gsheet { sheet_id }) => {
                let name = format!("gsheet:{}:{}", sheet_id, source.source_id);
                let spec = sheet_spec(&name, source.stream_id.clone(), &source.source_id);
                let fetcher = GsheetFetcher::new(&sheet_id)?;
                summaries.push(runner.run(&spec, &fetcher).await);
            },
            Err(e) => {
                warn!(stream_id = %source.stream_id, error = %e, "Skipping source row");
            },
        }
    }
    Ok(summaries)
}

fn log_summary(summary: &RunSummary) {
    if summary.outcome == RunOutcome::Failed {
        error!(
            source = %summary.source,
            outcome = summary.outcome.as_str(),
            error = summary.fatal_error.as_deref().unwrap_or("unknown"),
            fetched = summary.fetched,
            written = summary.written,
            "Pipeline run failed"
        );
    } else {
        info!(
            source = %summary.source,
            outcome = summary.outcome.as_str(),
            fetched = summary.fetched,
            rejected = summary.rejected,
            dropped = summary.dropped,
            written = summary.written,
            duplicate = summary.duplicate,
            failed = summary.failed,
            "Pipeline run finished"
        );
    }
}

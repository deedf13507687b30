//! Application execution: one report run from manifest to CSV

use std::env;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::cli::{self, date_parser};
use crate::config::ReportConfig;
use crate::git::GitRepositoryProvider;
use crate::manifest::Manifest;
use crate::output::{format_summary_table, format_totals, CsvExporter, CsvOutcome};
use crate::report::{CommitStream, FilterParams, ProjectSummary, ReportSources, RepositoryProvider, User};

/// Totals from a finished run
#[derive(Debug)]
pub struct ReportOutcome {
    pub row_count: usize,
    pub csv: CsvOutcome,
    pub summaries: Vec<ProjectSummary>,
}

/// Everything needed to generate one report besides the data sources
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub group: String,
    pub user: User,
    pub filters: FilterParams,
    pub config: ReportConfig,
    pub now: DateTime<Utc>,
}

pub fn run_report(args: &cli::Args, config: ReportConfig) -> Result<()> {
    let now = Utc::now();
    let manifest = Manifest::load(&args.manifest)?;

    let request = ReportRequest {
        group: args.group.clone(),
        user: resolve_user(&manifest, args.user.as_deref()),
        filters: build_filters(args, now)?,
        config,
        now,
    };
    let repositories = GitRepositoryProvider::new();

    let outcome = match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            let outcome = generate_report(&manifest, &repositories, &request, BufWriter::new(file))?;
            info!("Report written to {}", path.display());
            outcome
        }
        None => generate_report(&manifest, &repositories, &request, BufWriter::new(io::stdout().lock()))?,
    };

    if args.summary {
        eprintln!("{}", format_totals(outcome.row_count, &outcome.csv));
        eprint!("{}", format_summary_table(&outcome.summaries));
    }
    Ok(())
}

/// Stream the report for `request` into `writer` as CSV
pub fn generate_report<W: Write>(
    manifest: &Manifest,
    repositories: &dyn RepositoryProvider,
    request: &ReportRequest,
    writer: W,
) -> Result<ReportOutcome> {
    let group = manifest.find_group(&request.group)?;
    let sources = ReportSources::new(manifest, manifest, repositories);

    let mut stream = CommitStream::builder(sources)
        .group(group)
        .user(request.user.clone())
        .filters(request.filters.clone())
        .settings(request.config.settings)
        .now(request.now)
        .build()?;

    let mut exporter = CsvExporter::new(writer, Some(request.config.csv_byte_limit))
        .context("Failed to write CSV header")?;

    stream.find_each(|row| -> Result<()> {
        exporter.write_row(row).context("Failed to write CSV row")?;
        Ok(())
    })?;

    let (csv, _) = exporter.finish().context("Failed to flush CSV output")?;
    if csv.truncated {
        warn!(
            "CSV output truncated at {} bytes: {} of {} rows written",
            csv.bytes_written,
            csv.rows_written,
            stream.count()
        );
    }

    Ok(ReportOutcome {
        row_count: stream.count(),
        csv,
        summaries: stream.summaries().to_vec(),
    })
}

/// Build the window filters from `--from`, `--to` and `--commit-sha`
pub fn build_filters(args: &cli::Args, now: DateTime<Utc>) -> Result<FilterParams> {
    let mut filters = FilterParams::new();
    if let Some(from) = &args.from {
        filters = filters.from(date_parser::parse_date(from, now).context("Invalid --from date")?);
    }
    if let Some(to) = &args.to {
        filters = filters.to(date_parser::parse_date(to, now).context("Invalid --to date")?);
    }
    if let Some(sha) = &args.commit_sha {
        filters = filters.commit_sha(sha.trim());
    }
    Ok(filters)
}

/// The requesting user: a manifest user when one matches, otherwise an ad hoc one
pub fn resolve_user(manifest: &Manifest, name: Option<&str>) -> User {
    let name = name
        .map(str::to_string)
        .or_else(|| env::var("USER").ok())
        .unwrap_or_else(|| "unknown".to_string());

    manifest.find_user(&name).unwrap_or_else(|| {
        debug!("User {} not in manifest, using an ad hoc requester", name);
        User::new(0, name)
    })
}

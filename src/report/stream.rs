//! Stream Coordinator
//!
//! Drives a report run: builds the merge request index once, walks every
//! project in scope through a [`CommitBatchIterator`], joins each commit
//! against the index and hands the resulting rows to a caller-supplied sink.
//!
//! The run is single threaded and pull based. A sink error stops the run and
//! is returned to the caller exactly as the sink produced it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::batch::{BatchSettings, CommitBatchIterator};
use super::count::RunCount;
use super::error::{ReportError, ReportResult};
use super::index::MergeRequestIndex;
use super::model::{Commit, Group, Project, User};
use super::providers::{MergeRequestQuery, ReportSources};
use super::row::CsvRow;
use super::window::{FilterParams, Window};

/// Tunables for a report run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSettings {
    pub batch: BatchSettings,
    /// Include projects and merge requests from descendant groups
    pub include_subgroups: bool,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            batch: BatchSettings::default(),
            include_subgroups: true,
        }
    }
}

/// What one project contributed to the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSummary {
    pub project: String,
    pub commits: usize,
    pub rows: usize,
    pub repository_error: Option<String>,
}

impl ProjectSummary {
    fn new(project: &Project) -> Self {
        Self {
            project: project.path.clone(),
            commits: 0,
            rows: 0,
            repository_error: None,
        }
    }
}

/// Builder for [`CommitStream`]; group and user are mandatory
pub struct CommitStreamBuilder<'a> {
    sources: ReportSources<'a>,
    group: Option<Group>,
    user: Option<User>,
    filters: FilterParams,
    settings: ReportSettings,
    now: Option<DateTime<Utc>>,
}

impl<'a> CommitStreamBuilder<'a> {
    pub fn group(mut self, group: impl Into<Option<Group>>) -> Self {
        self.group = group.into();
        self
    }

    pub fn user(mut self, user: impl Into<Option<User>>) -> Self {
        self.user = user.into();
        self
    }

    pub fn filters(mut self, filters: FilterParams) -> Self {
        self.filters = filters;
        self
    }

    pub fn settings(mut self, settings: ReportSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Reference time for window defaults
    pub fn now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn build(self) -> ReportResult<CommitStream<'a>> {
        let group = self.group.ok_or(ReportError::MissingGroup)?;
        let user = self.user.ok_or(ReportError::MissingUser)?;
        self.settings.batch.validate()?;
        let window = Window::resolve(&self.filters, self.now.unwrap_or_else(Utc::now))?;

        Ok(CommitStream {
            sources: self.sources,
            group,
            user,
            window,
            settings: self.settings,
            count: RunCount::new(),
            summaries: Vec::new(),
        })
    }
}

/// One configured report run
pub struct CommitStream<'a> {
    sources: ReportSources<'a>,
    group: Group,
    user: User,
    window: Window,
    settings: ReportSettings,
    count: RunCount,
    summaries: Vec<ProjectSummary>,
}

impl<'a> CommitStream<'a> {
    pub fn builder(sources: ReportSources<'a>) -> CommitStreamBuilder<'a> {
        CommitStreamBuilder {
            sources,
            group: None,
            user: None,
            filters: FilterParams::default(),
            settings: ReportSettings::default(),
            now: None,
        }
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    /// Rows yielded by the last call to [`CommitStream::find_each`]
    pub fn count(&self) -> usize {
        self.count.get()
    }

    /// Per-project breakdown of the last run
    pub fn summaries(&self) -> &[ProjectSummary] {
        &self.summaries
    }

    /// Call `sink` once per output row.
    ///
    /// Provider failures while building the index or listing projects abort the
    /// run. Repository failures only end the affected project. After any early
    /// return, [`CommitStream::count`] holds the rows the sink accepted.
    pub fn find_each<F, E>(&mut self, mut sink: F) -> Result<(), E>
    where
        F: FnMut(&CsvRow<'_>) -> Result<(), E>,
        E: From<ReportError>,
    {
        self.count.reset();
        self.summaries.clear();

        info!(
            "Generating compliance report for group {} requested by {} ({} to {})",
            self.group.full_path,
            self.user.name,
            self.window.from().to_rfc3339(),
            self.window.to().to_rfc3339()
        );

        let include_subgroups = self.settings.include_subgroups;
        let query = MergeRequestQuery::new(&self.group, include_subgroups, &self.window);
        let index = MergeRequestIndex::build(self.sources.merge_requests, &query)?;

        let projects = self
            .sources
            .projects
            .projects(&self.group, include_subgroups)
            .map_err(ReportError::from)?;
        debug!("Streaming commits for {} projects", projects.len());

        let cap = self.settings.batch.commit_cap;
        for project in projects {
            let mut summary = ProjectSummary::new(&project);
            let mut commits = CommitBatchIterator::new(
                self.sources.repositories,
                Arc::clone(&project),
                &self.window,
                self.settings.batch,
            );

            while summary.commits < cap {
                let Some(commit) = commits.next() else {
                    break;
                };
                summary.commits += 1;

                let emitted = emit_rows(&commit, &index, &self.window, &mut sink, &mut self.count, &mut summary);
                if let Err(e) = emitted {
                    warn!(
                        "Report sink failed after {} rows on project {}",
                        self.count.get(),
                        project.path
                    );
                    self.summaries.push(summary);
                    return Err(e);
                }
            }

            summary.repository_error = commits.error().map(ToString::to_string);
            debug!(
                "Project {}: {} commits, {} rows",
                summary.project, summary.commits, summary.rows
            );
            self.summaries.push(summary);
        }

        info!("Compliance report complete: {} rows", self.count.get());
        Ok(())
    }
}

/// Yield one row per associated merge request, or a single unassociated row
fn emit_rows<F, E>(
    commit: &Commit,
    index: &MergeRequestIndex,
    window: &Window,
    sink: &mut F,
    count: &mut RunCount,
    summary: &mut ProjectSummary,
) -> Result<(), E>
where
    F: FnMut(&CsvRow<'_>) -> Result<(), E>,
{
    let merge_requests = index.lookup(&commit.sha);

    if merge_requests.is_empty() {
        sink(&CsvRow::commit_only(commit, window))?;
        count.increment();
        summary.rows += 1;
        return Ok(());
    }

    for merge_request in merge_requests {
        sink(&CsvRow::with_merge_request(commit, merge_request, window))?;
        count.increment();
        summary.rows += 1;
    }
    Ok(())
}

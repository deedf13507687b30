//! Commit Batch Iterator
//!
//! Pages through one project's commits in bounded batches so that at most one
//! batch is held in memory, stopping at the per-project cap or when the
//! repository runs out of commits in the window.

use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::error::{ReportError, ReportResult, RepositoryError};
use super::model::{Commit, Project};
use super::providers::{CommitPage, RepositoryProvider};
use super::window::Window;

pub const DEFAULT_COMMIT_CAP: usize = 1024;
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Paging limits applied to every project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSettings {
    /// Maximum commits processed per project
    pub commit_cap: usize,
    /// Commits requested per repository call
    pub batch_size: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            commit_cap: DEFAULT_COMMIT_CAP,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl BatchSettings {
    pub fn new(commit_cap: usize, batch_size: usize) -> Self {
        Self { commit_cap, batch_size }
    }

    pub fn validate(&self) -> ReportResult<()> {
        if self.batch_size == 0 {
            return Err(ReportError::invalid_settings("batch size must be greater than 0"));
        }
        if self.commit_cap == 0 {
            return Err(ReportError::invalid_settings("commit cap must be greater than 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Look up exactly one SHA on the first call
    SingleSha,
    /// Page through the window
    Paged,
}

/// Lazy, forward-only sequence of a project's commits
pub struct CommitBatchIterator<'a> {
    repositories: &'a dyn RepositoryProvider,
    project: Arc<Project>,
    window: &'a Window,
    settings: BatchSettings,
    mode: Mode,
    buffer: VecDeque<Commit>,
    offset: usize,
    yielded: usize,
    batches_fetched: usize,
    exhausted: bool,
    error: Option<RepositoryError>,
}

impl<'a> CommitBatchIterator<'a> {
    pub fn new(
        repositories: &'a dyn RepositoryProvider,
        project: Arc<Project>,
        window: &'a Window,
        settings: BatchSettings,
    ) -> Self {
        let mode = if window.has_commit_sha() { Mode::SingleSha } else { Mode::Paged };
        Self {
            repositories,
            project,
            window,
            settings,
            mode,
            buffer: VecDeque::new(),
            offset: 0,
            yielded: 0,
            batches_fetched: 0,
            exhausted: false,
            error: None,
        }
    }

    /// Commits handed out so far
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Repository calls made so far
    pub fn batches_fetched(&self) -> usize {
        self.batches_fetched
    }

    /// The repository error that ended iteration early, if any
    pub fn error(&self) -> Option<&RepositoryError> {
        self.error.as_ref()
    }

    fn cap_reached(&self) -> bool {
        self.yielded >= self.settings.commit_cap
    }

    fn fail(&mut self, error: RepositoryError) {
        warn!("Skipping remaining commits for project {}: {}", self.project.path, error);
        self.exhausted = true;
        self.buffer.clear();
        self.error = Some(error);
    }

    fn fetch_single(&mut self) {
        self.exhausted = true;
        let Some(sha) = self.window.commit_sha() else {
            return;
        };

        self.batches_fetched += 1;
        match self.repositories.commit_by_sha(&self.project, sha) {
            Ok(Some(commit)) => self.buffer.push_back(commit),
            Ok(None) => debug!("Commit {} not found in project {}", sha, self.project.path),
            Err(e) => self.fail(e),
        }
    }

    fn fetch_page(&mut self) {
        let remaining = self.settings.commit_cap - self.yielded;
        let limit = self.settings.batch_size.min(remaining);
        let page = CommitPage::new(self.window, self.offset, limit);

        self.batches_fetched += 1;
        match self.repositories.commits(&self.project, &page) {
            Ok(batch) => {
                debug!(
                    "Fetched batch {} for project {} (offset {}, {} of {} commits)",
                    self.batches_fetched,
                    self.project.path,
                    self.offset,
                    batch.len(),
                    limit
                );
                if batch.len() < limit {
                    self.exhausted = true;
                }
                self.offset += batch.len();
                self.buffer.extend(batch);
            }
            Err(e) => self.fail(e),
        }
    }

    fn attach_project(&self, mut commit: Commit) -> Commit {
        if commit.project.is_none() {
            commit.project = Some(Arc::clone(&self.project));
        }
        commit
    }
}

impl Iterator for CommitBatchIterator<'_> {
    type Item = Commit;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.cap_reached() {
                self.buffer.clear();
                return None;
            }

            if let Some(commit) = self.buffer.pop_front() {
                // Providers may ignore the page bounds; the window is rechecked per row
                if self.mode == Mode::Paged && !self.window.contains(commit.committed_at) {
                    continue;
                }
                self.yielded += 1;
                return Some(self.attach_project(commit));
            }

            if self.exhausted {
                return None;
            }

            match self.mode {
                Mode::SingleSha => self.fetch_single(),
                Mode::Paged => self.fetch_page(),
            }
        }
    }
}

impl FusedIterator for CommitBatchIterator<'_> {}

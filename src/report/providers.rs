//! Data Collaborators
//!
//! Traits for the three sources the engine reads from. Implementations live
//! outside the engine: the manifest loader for projects and merge requests,
//! git2 for repositories, and hand-rolled fakes in tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::error::{ProviderError, RepositoryError};
use super::model::{Commit, Group, GroupHierarchy, MergeRequest, Project};
use super::window::Window;

/// Enumerates projects under a group
pub trait ProjectProvider {
    fn projects(&self, group: &Group, include_subgroups: bool) -> Result<Vec<Arc<Project>>, ProviderError>;
}

/// Loads merged merge requests for a group and window
pub trait MergeRequestProvider {
    fn merged_merge_requests(&self, query: &MergeRequestQuery<'_>) -> Result<Vec<MergeRequest>, ProviderError>;
}

/// Reads commits from a project's repository
pub trait RepositoryProvider {
    /// Look up a single commit, `Ok(None)` when the SHA is unknown
    fn commit_by_sha(&self, project: &Arc<Project>, sha: &str) -> Result<Option<Commit>, RepositoryError>;

    /// One page of commits in the repository's natural order
    fn commits(&self, project: &Arc<Project>, page: &CommitPage) -> Result<Vec<Commit>, RepositoryError>;
}

/// Paging request for [`RepositoryProvider::commits`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitPage {
    pub offset: usize,
    pub limit: usize,
    /// Inclusive lower bound on commit time
    pub after: DateTime<Utc>,
    /// Exclusive upper bound on commit time
    pub before: DateTime<Utc>,
}

impl CommitPage {
    pub fn new(window: &Window, offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit,
            after: window.from(),
            before: window.to(),
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.after && ts < self.before
    }
}

/// Filter for the merge request side of the join
#[derive(Debug, Clone, Copy)]
pub struct MergeRequestQuery<'a> {
    pub group: &'a Group,
    pub include_subgroups: bool,
    pub window: &'a Window,
}

impl<'a> MergeRequestQuery<'a> {
    pub fn new(group: &'a Group, include_subgroups: bool, window: &'a Window) -> Self {
        Self {
            group,
            include_subgroups,
            window,
        }
    }

    /// Shared filter semantics for in-memory providers
    pub fn matches(&self, mr: &MergeRequest, hierarchy: &GroupHierarchy) -> bool {
        if !mr.is_merged() {
            return false;
        }
        if !mr.merged_at.is_some_and(|at| self.window.contains(at)) {
            return false;
        }

        let in_group = mr
            .group_id
            .is_some_and(|id| hierarchy.is_within(id, self.group.id, self.include_subgroups));
        if !in_group {
            return false;
        }

        match self.window.commit_sha() {
            Some(sha) => mr.associated_shas().any(|candidate| candidate == sha),
            None => true,
        }
    }
}

/// The three collaborators a report run reads from
#[derive(Clone, Copy)]
pub struct ReportSources<'a> {
    pub projects: &'a dyn ProjectProvider,
    pub merge_requests: &'a dyn MergeRequestProvider,
    pub repositories: &'a dyn RepositoryProvider,
}

impl<'a> ReportSources<'a> {
    pub fn new(
        projects: &'a dyn ProjectProvider,
        merge_requests: &'a dyn MergeRequestProvider,
        repositories: &'a dyn RepositoryProvider,
    ) -> Self {
        Self {
            projects,
            merge_requests,
            repositories,
        }
    }
}

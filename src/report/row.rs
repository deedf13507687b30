//! Row Projector
//!
//! Flattens one commit and at most one merge request into the columns of the
//! compliance CSV. Every accessor tolerates missing associations.

use chrono::{DateTime, SecondsFormat, Utc};

use super::model::{Commit, MergeRequest};
use super::window::Window;

/// Separator between approver names
pub const APPROVER_SEPARATOR: &str = " | ";

/// Whether a commit row is joined with a merge request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Association<'a> {
    CommitOnly,
    MergeRequest(&'a MergeRequest),
}

/// A single output record, built on demand and borrowed by the sink
#[derive(Debug, Clone, Copy)]
pub struct CsvRow<'a> {
    commit: &'a Commit,
    association: Association<'a>,
    window: &'a Window,
}

impl<'a> CsvRow<'a> {
    pub const HEADERS: [&'static str; 12] = [
        "Commit Sha",
        "Commit Author",
        "Committed By",
        "Date Committed",
        "Group",
        "Project",
        "Merge Commit",
        "Merge Request",
        "Merged By",
        "Merged At",
        "Pipeline",
        "Approver(s)",
    ];

    pub fn commit_only(commit: &'a Commit, window: &'a Window) -> Self {
        Self {
            commit,
            association: Association::CommitOnly,
            window,
        }
    }

    pub fn with_merge_request(commit: &'a Commit, merge_request: &'a MergeRequest, window: &'a Window) -> Self {
        Self {
            commit,
            association: Association::MergeRequest(merge_request),
            window,
        }
    }

    pub fn commit(&self) -> &'a Commit {
        self.commit
    }

    pub fn association(&self) -> Association<'a> {
        self.association
    }

    pub fn merge_request(&self) -> Option<&'a MergeRequest> {
        match self.association {
            Association::CommitOnly => None,
            Association::MergeRequest(mr) => Some(mr),
        }
    }

    pub fn sha(&self) -> &'a str {
        &self.commit.sha
    }

    /// Commit author, or the merge request author for synthetic commits without one
    pub fn author_name(&self) -> Option<&'a str> {
        self.commit
            .author_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or_else(|| self.merge_request()?.author.as_ref().map(|u| u.name.as_str()))
    }

    pub fn committer_name(&self) -> Option<&'a str> {
        self.commit.committer_name.as_deref()
    }

    pub fn committed_at(&self) -> DateTime<Utc> {
        self.commit.committed_at
    }

    /// Whether the commit falls inside the report window
    pub fn within_window(&self) -> bool {
        self.window.contains(self.commit.committed_at)
    }

    pub fn group_name(&self) -> Option<&'a str> {
        match &self.commit.project {
            Some(project) => Some(project.group_name.as_str()),
            None => self.merge_request()?.group_name.as_deref(),
        }
    }

    pub fn project_name(&self) -> Option<&'a str> {
        match &self.commit.project {
            Some(project) => Some(project.name.as_str()),
            None => self.merge_request()?.project_name.as_deref(),
        }
    }

    pub fn merge_commit_sha(&self) -> Option<&'a str> {
        self.merge_request()?.merge_commit_sha.as_deref()
    }

    pub fn merge_request_id(&self) -> Option<u64> {
        self.merge_request().map(|mr| mr.id)
    }

    pub fn merged_by(&self) -> Option<&'a str> {
        self.merge_request()?.merged_by.as_ref().map(|u| u.name.as_str())
    }

    pub fn merged_at(&self) -> Option<DateTime<Utc>> {
        self.merge_request()?.merged_at
    }

    pub fn pipeline_id(&self) -> Option<u64> {
        self.merge_request()?.pipeline_id
    }

    /// Approver names, sorted and pipe-joined; empty without a merge request
    pub fn approvers(&self) -> String {
        let Some(mr) = self.merge_request() else {
            return String::new();
        };
        let mut names: Vec<&str> = mr.approvers.iter().map(|u| u.name.as_str()).collect();
        names.sort_unstable();
        names.join(APPROVER_SEPARATOR)
    }

    /// Column values in [`CsvRow::HEADERS`] order
    pub fn to_record(&self) -> Vec<String> {
        vec![
            self.sha().to_string(),
            text(self.author_name()),
            text(self.committer_name()),
            timestamp(Some(self.committed_at())),
            text(self.group_name()),
            text(self.project_name()),
            text(self.merge_commit_sha()),
            number(self.merge_request_id()),
            text(self.merged_by()),
            timestamp(self.merged_at()),
            number(self.pipeline_id()),
            self.approvers(),
        ]
    }
}

fn text(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

fn number(value: Option<u64>) -> String {
    value.map(|n| n.to_string()).unwrap_or_default()
}

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

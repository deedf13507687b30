//! Filter Window
//!
//! The `[from, to)` time range and optional commit SHA that bound a report run.
//! Resolved once from caller input and then shared read-only by every stage.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use super::error::{ReportError, ReportResult};

/// Raw filter input as supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    /// Start of the window (inclusive), defaults to one month before `to`'s reference time
    pub from: Option<DateTime<Utc>>,
    /// End of the window (exclusive), defaults to now
    pub to: Option<DateTime<Utc>>,
    /// Restrict the report to a single commit
    pub commit_sha: Option<String>,
}

impl FilterParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn commit_sha(mut self, sha: impl Into<String>) -> Self {
        self.commit_sha = Some(sha.into());
        self
    }
}

/// Resolved, immutable filter window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    commit_sha: Option<String>,
}

impl Window {
    /// Resolve caller params against a reference time
    pub fn resolve(params: &FilterParams, now: DateTime<Utc>) -> ReportResult<Self> {
        let from = params.from.unwrap_or_else(|| one_month_before(now));
        let to = params.to.unwrap_or(now);

        if from > to {
            return Err(ReportError::InvalidWindow {
                from: from.to_rfc3339(),
                to: to.to_rfc3339(),
            });
        }

        let commit_sha = params
            .commit_sha
            .as_deref()
            .map(str::trim)
            .filter(|sha| !sha.is_empty())
            .map(str::to_ascii_lowercase);

        Ok(Self { from, to, commit_sha })
    }

    /// Build a window directly, bypassing defaults
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>, commit_sha: Option<String>) -> ReportResult<Self> {
        Self::resolve(&FilterParams { from: Some(from), to: Some(to), commit_sha }, to)
    }

    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    pub fn to(&self) -> DateTime<Utc> {
        self.to
    }

    pub fn commit_sha(&self) -> Option<&str> {
        self.commit_sha.as_deref()
    }

    pub fn has_commit_sha(&self) -> bool {
        self.commit_sha.is_some()
    }

    /// Half-open containment check: `from <= ts < to`
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.from && ts < self.to
    }
}

fn one_month_before(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(1))
        .unwrap_or_else(|| now - Duration::days(30))
}

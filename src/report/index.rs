//! Merge Request Index
//!
//! Eagerly loads every merged merge request in scope and maps each associated
//! commit SHA to the merge requests it belongs to. Commit lookups during the
//! stream are then plain hash lookups instead of one query per commit.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};

use super::error::ReportResult;
use super::model::MergeRequest;
use super::providers::{MergeRequestProvider, MergeRequestQuery};

/// Read-only SHA -> merge requests multi-map
#[derive(Debug, Default)]
pub struct MergeRequestIndex {
    entries: HashMap<String, Vec<Arc<MergeRequest>>>,
    merge_request_count: usize,
}

impl MergeRequestIndex {
    pub fn builder() -> MergeRequestIndexBuilder {
        MergeRequestIndexBuilder::default()
    }

    /// Run the merge request query once and index the full result
    pub fn build(provider: &dyn MergeRequestProvider, query: &MergeRequestQuery<'_>) -> ReportResult<Self> {
        debug!(
            "Loading merged merge requests for group {} (subgroups: {})",
            query.group.full_path, query.include_subgroups
        );

        let merge_requests = provider.merged_merge_requests(query)?;
        let mut builder = Self::builder();
        for mr in merge_requests {
            builder.insert(mr);
        }

        let index = builder.build();
        info!(
            "Indexed {} merge requests across {} commit SHAs",
            index.merge_request_count(),
            index.len()
        );
        Ok(index)
    }

    /// Merge requests for a SHA in registration order; empty if unknown
    pub fn lookup(&self, sha: &str) -> &[Arc<MergeRequest>] {
        self.entries.get(sha).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct SHA keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn merge_request_count(&self) -> usize {
        self.merge_request_count
    }
}

/// Accumulates merge requests before the index is frozen
#[derive(Debug, Default)]
pub struct MergeRequestIndexBuilder {
    entries: HashMap<String, Vec<Arc<MergeRequest>>>,
    merge_request_count: usize,
}

impl MergeRequestIndexBuilder {
    /// Register a merge request under each of its distinct SHAs.
    ///
    /// A SHA listed more than once for the same merge request (for example a
    /// squash commit that is also the merge commit) yields a single entry.
    pub fn insert(&mut self, merge_request: MergeRequest) -> &mut Self {
        let merge_request = Arc::new(merge_request);
        self.merge_request_count += 1;

        for sha in merge_request.associated_shas() {
            if sha.is_empty() {
                continue;
            }
            let bucket = self.entries.entry(sha.to_string()).or_default();
            if !bucket.iter().any(|existing| Arc::ptr_eq(existing, &merge_request)) {
                bucket.push(Arc::clone(&merge_request));
            }
        }
        self
    }

    pub fn build(self) -> MergeRequestIndex {
        MergeRequestIndex {
            entries: self.entries,
            merge_request_count: self.merge_request_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::error::ProviderError;
    use crate::report::model::{Group, Project};
    use crate::report::window::Window;
    use chrono::{TimeZone, Utc};

    fn project() -> Project {
        Project::new(1, "api", &Group::new(1, "Org", "org"))
    }

    fn mr(id: u64, shas: &[&str]) -> MergeRequest {
        let mut mr = MergeRequest::new(id, id, &project());
        mr.commit_shas = shas.iter().map(|s| s.to_string()).collect();
        mr
    }

    #[test]
    fn test_lookup_unknown_sha_is_empty() {
        let index = MergeRequestIndex::builder().build();
        assert!(index.lookup("deadbeef").is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn test_shared_sha_collects_in_insert_order() {
        let mut builder = MergeRequestIndex::builder();
        builder.insert(mr(1, &["a", "b"])).insert(mr(2, &["b", "c"]));
        let index = builder.build();

        let ids: Vec<u64> = index.lookup("b").iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(index.lookup("a").len(), 1);
        assert_eq!(index.len(), 3);
        assert_eq!(index.merge_request_count(), 2);
    }

    #[test]
    fn test_squash_and_merge_shas_registered() {
        let mut m = mr(1, &["a"]);
        m.squash_commit_sha = Some("s".into());
        m.merge_commit_sha = Some("m".into());
        let mut builder = MergeRequestIndex::builder();
        builder.insert(m);
        let index = builder.build();

        assert_eq!(index.lookup("s")[0].id, 1);
        assert_eq!(index.lookup("m")[0].id, 1);
    }

    #[test]
    fn test_same_sha_in_every_role_registers_once() {
        let mut m = mr(1, &["x", "x"]);
        m.squash_commit_sha = Some("x".into());
        m.merge_commit_sha = Some("x".into());
        let mut builder = MergeRequestIndex::builder();
        builder.insert(m);
        let index = builder.build();

        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup("x").len(), 1);
    }

    struct FailingProvider;

    impl MergeRequestProvider for FailingProvider {
        fn merged_merge_requests(&self, _query: &MergeRequestQuery<'_>) -> Result<Vec<MergeRequest>, ProviderError> {
            Err(ProviderError::MergeRequests("connection reset".into()))
        }
    }

    #[test]
    fn test_provider_failure_propagates() {
        let group = Group::new(1, "Org", "org");
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let window = Window::new(from, to, None).unwrap();
        let query = MergeRequestQuery::new(&group, true, &window);

        let err = MergeRequestIndex::build(&FailingProvider, &query).unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }
}

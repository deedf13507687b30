//! Report Error Types
//!
//! Errors raised by the report engine and its data collaborators.

use thiserror::Error;

/// Errors that abort a report run
#[derive(Debug, Error)]
pub enum ReportError {
    /// The report was constructed without a group
    #[error("A group is required to build a compliance report")]
    MissingGroup,

    /// The report was constructed without a requesting user
    #[error("A user is required to build a compliance report")]
    MissingUser,

    /// The filter window is inverted
    #[error("Invalid report window: from {from} is after to {to}")]
    InvalidWindow { from: String, to: String },

    /// Batch settings that can never make progress
    #[error("Invalid report settings: {0}")]
    InvalidSettings(String),

    /// Project or merge request lookup failed
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ReportError {
    pub fn invalid_settings(msg: impl Into<String>) -> Self {
        Self::InvalidSettings(msg.into())
    }
}

/// Failure reported by a project or merge request provider.
///
/// These are fatal for the run: a partially loaded index cannot be trusted.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Project query failed: {0}")]
    Projects(String),

    #[error("Merge request query failed: {0}")]
    MergeRequests(String),
}

/// Failure reported by a repository provider for a single project.
///
/// The coordinator recovers from every variant by skipping the project.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Repository not found for project {project}")]
    NotFound { project: String },

    #[error("Repository for project {project} is unreadable: {reason}")]
    Corrupted { project: String, reason: String },

    #[error("Repository backend error: {0}")]
    Backend(String),
}

impl RepositoryError {
    pub fn not_found(project: impl Into<String>) -> Self {
        Self::NotFound { project: project.into() }
    }

    pub fn corrupted(project: impl Into<String>, reason: impl ToString) -> Self {
        Self::Corrupted {
            project: project.into(),
            reason: reason.to_string(),
        }
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Whether the repository is simply absent rather than broken
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for report operations
pub type ReportResult<T> = Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_converts_transparently() {
        let err: ReportError = ProviderError::MergeRequests("timeout".to_string()).into();
        assert_eq!(err.to_string(), "Merge request query failed: timeout");
        assert!(matches!(err, ReportError::Provider(_)));
    }

    #[test]
    fn test_repository_error_classification() {
        assert!(RepositoryError::not_found("gitlab-org/gitlab").is_not_found());
        assert!(!RepositoryError::corrupted("gitlab-org/gitlab", "bad object").is_not_found());
        assert!(!RepositoryError::backend("io").is_not_found());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ReportError::MissingGroup.to_string(),
            "A group is required to build a compliance report"
        );
        let err = RepositoryError::corrupted("web", "missing tree");
        assert_eq!(err.to_string(), "Repository for project web is unreadable: missing tree");
    }
}

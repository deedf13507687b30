//! Manifest-backed data sources
//!
//! A manifest is a JSON or TOML document listing groups, users, projects and
//! merged merge requests, with each project pointing at a local git
//! repository. It stands in for the project and merge request databases so the
//! report can run against plain checkouts.
//!
//! ```toml
//! [[groups]]
//! id = 1
//! name = "GitLab Org"
//! full_path = "gitlab-org"
//!
//! [[users]]
//! id = 7
//! name = "Ada Lovelace"
//! username = "ada"
//!
//! [[projects]]
//! id = 10
//! name = "gitlab"
//! group_id = 1
//! repository = "repos/gitlab"
//!
//! [[merge_requests]]
//! id = 100
//! iid = 1
//! project_id = 10
//! author_id = 7
//! commit_shas = ["4b825dc642cb6eb9a060e54bf8d69288fbee4904"]
//! merged_at = "2024-01-15T10:00:00Z"
//! approver_ids = [7]
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Deserialize;

use crate::git::is_git_repository;
use crate::report::{
    Group, GroupHierarchy, GroupId, MergeRequest, MergeRequestProvider, MergeRequestQuery, Project,
    ProjectId, ProjectProvider, ProviderError, User,
};

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    groups: Vec<Group>,
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    projects: Vec<RawProject>,
    #[serde(default)]
    merge_requests: Vec<RawMergeRequest>,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    id: ProjectId,
    name: String,
    group_id: GroupId,
    #[serde(default)]
    repository: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawMergeRequest {
    id: u64,
    iid: u64,
    project_id: ProjectId,
    #[serde(default)]
    author_id: Option<u64>,
    #[serde(default)]
    commit_shas: Vec<String>,
    #[serde(default)]
    squash_commit_sha: Option<String>,
    #[serde(default)]
    merge_commit_sha: Option<String>,
    #[serde(default)]
    merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    merged_by_id: Option<u64>,
    #[serde(default)]
    pipeline_id: Option<u64>,
    #[serde(default)]
    approver_ids: Vec<u64>,
}

/// Resolved, in-memory view of a manifest file
#[derive(Debug)]
pub struct Manifest {
    groups: Vec<Group>,
    hierarchy: GroupHierarchy,
    users: HashMap<u64, User>,
    projects: Vec<Arc<Project>>,
    merge_requests: Vec<MergeRequest>,
}

impl Manifest {
    /// Load a manifest, choosing the format from the file extension
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;

        let raw: RawManifest = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML manifest: {}", path.display()))?,
            _ => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON manifest: {}", path.display()))?,
        };

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let manifest = Self::resolve(raw, base_dir)?;
        info!(
            "Loaded manifest {}: {} groups, {} projects, {} merge requests",
            path.display(),
            manifest.groups.len(),
            manifest.projects.len(),
            manifest.merge_requests.len()
        );
        Ok(manifest)
    }

    /// Parse a JSON manifest from a string; relative repository paths resolve against `base_dir`
    pub fn from_json(content: &str, base_dir: &Path) -> Result<Self> {
        let raw: RawManifest = serde_json::from_str(content).context("Failed to parse JSON manifest")?;
        Self::resolve(raw, base_dir)
    }

    fn resolve(raw: RawManifest, base_dir: &Path) -> Result<Self> {
        let groups_by_id: HashMap<GroupId, &Group> = raw.groups.iter().map(|g| (g.id, g)).collect();
        let users: HashMap<u64, User> = raw.users.iter().map(|u| (u.id, u.clone())).collect();

        let mut projects = Vec::with_capacity(raw.projects.len());
        for raw_project in raw.projects {
            let Some(group) = groups_by_id.get(&raw_project.group_id) else {
                bail!(
                    "Project {} ({}) references unknown group {}",
                    raw_project.id,
                    raw_project.name,
                    raw_project.group_id
                );
            };

            let mut project = Project::new(raw_project.id, raw_project.name, group);
            if let Some(repository) = raw_project.repository {
                let repository = base_dir.join(repository);
                if !is_git_repository(&repository) {
                    warn!(
                        "Project {} points at {} which is not a git repository; it will be skipped",
                        project.path,
                        repository.display()
                    );
                }
                project = project.with_repository(repository);
            }
            projects.push(Arc::new(project));
        }

        let projects_by_id: HashMap<ProjectId, &Arc<Project>> = projects.iter().map(|p| (p.id, p)).collect();
        let user = |id: Option<u64>, role: &str, mr: u64| -> Result<Option<User>> {
            match id {
                None => Ok(None),
                Some(id) => match users.get(&id) {
                    Some(user) => Ok(Some(user.clone())),
                    None => bail!("Merge request {} references unknown {} {}", mr, role, id),
                },
            }
        };

        let mut merge_requests = Vec::with_capacity(raw.merge_requests.len());
        for raw_mr in raw.merge_requests {
            let Some(project) = projects_by_id.get(&raw_mr.project_id) else {
                bail!(
                    "Merge request {} references unknown project {}",
                    raw_mr.id,
                    raw_mr.project_id
                );
            };

            let mut mr = MergeRequest::new(raw_mr.id, raw_mr.iid, project);
            mr.author = user(raw_mr.author_id, "author", raw_mr.id)?;
            mr.merged_by = user(raw_mr.merged_by_id, "merging user", raw_mr.id)?;
            mr.approvers = raw_mr
                .approver_ids
                .iter()
                .filter_map(|id| user(Some(*id), "approver", raw_mr.id).transpose())
                .collect::<Result<Vec<_>>>()?;
            mr.commit_shas = raw_mr.commit_shas;
            mr.squash_commit_sha = raw_mr.squash_commit_sha;
            mr.merge_commit_sha = raw_mr.merge_commit_sha;
            mr.merged_at = raw_mr.merged_at;
            mr.pipeline_id = raw_mr.pipeline_id;
            merge_requests.push(mr);
        }

        let hierarchy = GroupHierarchy::new(&raw.groups);
        Ok(Self {
            groups: raw.groups,
            hierarchy,
            users,
            projects,
            merge_requests,
        })
    }

    pub fn find_group(&self, full_path: &str) -> Result<Group, ProviderError> {
        let full_path = full_path.trim_matches('/');
        self.groups
            .iter()
            .find(|g| g.full_path == full_path)
            .cloned()
            .ok_or_else(|| ProviderError::GroupNotFound(full_path.to_string()))
    }

    /// Find a user by username or display name
    pub fn find_user(&self, name: &str) -> Option<User> {
        self.users
            .values()
            .find(|u| u.username.as_deref() == Some(name) || u.name == name)
            .cloned()
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn merge_requests(&self) -> &[MergeRequest] {
        &self.merge_requests
    }
}

impl ProjectProvider for Manifest {
    fn projects(&self, group: &Group, include_subgroups: bool) -> Result<Vec<Arc<Project>>, ProviderError> {
        let projects: Vec<Arc<Project>> = self
            .projects
            .iter()
            .filter(|p| self.hierarchy.is_within(p.group_id, group.id, include_subgroups))
            .cloned()
            .collect();
        debug!("Group {} has {} projects in scope", group.full_path, projects.len());
        Ok(projects)
    }
}

impl MergeRequestProvider for Manifest {
    fn merged_merge_requests(&self, query: &MergeRequestQuery<'_>) -> Result<Vec<MergeRequest>, ProviderError> {
        Ok(self
            .merge_requests
            .iter()
            .filter(|mr| query.matches(mr, &self.hierarchy))
            .cloned()
            .collect())
    }
}

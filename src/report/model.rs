//! Report Entities
//!
//! Read-only records the engine joins: groups, projects, users, merge requests
//! and commits. Nothing here is mutated once loaded.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type GroupId = u64;
pub type ProjectId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl User {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            username: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub full_path: String,
    #[serde(default)]
    pub parent_id: Option<GroupId>,
}

impl Group {
    pub fn new(id: GroupId, name: impl Into<String>, full_path: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            full_path: full_path.into(),
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: GroupId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Parent links for a set of groups
#[derive(Debug, Clone, Default)]
pub struct GroupHierarchy {
    parents: HashMap<GroupId, Option<GroupId>>,
}

impl GroupHierarchy {
    pub fn new<'a>(groups: impl IntoIterator<Item = &'a Group>) -> Self {
        let parents = groups.into_iter().map(|g| (g.id, g.parent_id)).collect();
        Self { parents }
    }

    /// True when `candidate` is `root`, or a descendant of it and subgroups are included
    pub fn is_within(&self, candidate: GroupId, root: GroupId, include_subgroups: bool) -> bool {
        if candidate == root {
            return true;
        }
        if !include_subgroups {
            return false;
        }

        // Bounded by the number of known groups so a malformed cycle cannot spin forever
        let mut current = self.parents.get(&candidate).copied().flatten();
        for _ in 0..self.parents.len() {
            match current {
                Some(id) if id == root => return true,
                Some(id) => current = self.parents.get(&id).copied().flatten(),
                None => return false,
            }
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    /// Full route, e.g. `gitlab-org/gitlab`
    pub path: String,
    pub group_id: GroupId,
    pub group_name: String,
    #[serde(default)]
    pub repository: Option<PathBuf>,
}

impl Project {
    pub fn new(id: ProjectId, name: impl Into<String>, group: &Group) -> Self {
        let name = name.into();
        Self {
            id,
            path: format!("{}/{}", group.full_path, name),
            name,
            group_id: group.id,
            group_name: group.name.clone(),
            repository: None,
        }
    }

    pub fn with_repository(mut self, path: impl Into<PathBuf>) -> Self {
        self.repository = Some(path.into());
        self
    }
}

/// A merged change and the metadata the report needs about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub id: u64,
    /// Project-scoped number shown to users as `!iid`
    pub iid: u64,
    pub project_id: ProjectId,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub author: Option<User>,
    #[serde(default)]
    pub commit_shas: Vec<String>,
    #[serde(default)]
    pub squash_commit_sha: Option<String>,
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merged_by: Option<User>,
    #[serde(default)]
    pub pipeline_id: Option<u64>,
    #[serde(default)]
    pub approvers: Vec<User>,
}

impl MergeRequest {
    pub fn new(id: u64, iid: u64, project: &Project) -> Self {
        Self {
            id,
            iid,
            project_id: project.id,
            project_name: Some(project.name.clone()),
            group_id: Some(project.group_id),
            group_name: Some(project.group_name.clone()),
            author: None,
            commit_shas: Vec::new(),
            squash_commit_sha: None,
            merge_commit_sha: None,
            merged_at: None,
            merged_by: None,
            pipeline_id: None,
            approvers: Vec::new(),
        }
    }

    pub fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }

    /// Every SHA that should resolve back to this merge request, in registration order
    pub fn associated_shas(&self) -> impl Iterator<Item = &str> {
        self.commit_shas
            .iter()
            .map(String::as_str)
            .chain(self.squash_commit_sha.as_deref())
            .chain(self.merge_commit_sha.as_deref())
    }
}

/// Immutable repository commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub committer_name: Option<String>,
    pub authored_at: DateTime<Utc>,
    pub committed_at: DateTime<Utc>,
    #[serde(skip)]
    pub project: Option<Arc<Project>>,
}

impl Commit {
    pub fn new(sha: impl Into<String>, committed_at: DateTime<Utc>) -> Self {
        Self {
            sha: sha.into(),
            author_name: None,
            committer_name: None,
            authored_at: committed_at,
            committed_at,
            project: None,
        }
    }

    pub fn authored_by(mut self, name: impl Into<String>) -> Self {
        self.author_name = Some(name.into());
        self
    }

    pub fn committed_by(mut self, name: impl Into<String>) -> Self {
        self.committer_name = Some(name.into());
        self
    }

    pub fn in_project(mut self, project: Arc<Project>) -> Self {
        self.project = Some(project);
        self
    }
}

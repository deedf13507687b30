use std::cell::RefCell;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use git2::{ErrorCode, Oid, Repository, Sort};
use log::{debug, trace};

use crate::report::{Commit, CommitPage, Project, ProjectId, RepositoryError, RepositoryProvider};

/// Check if the given path is a git repository
pub fn is_git_repository<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    debug!("Checking if path is git repository: {}", path.display());

    match Repository::open(path) {
        Ok(_) => true,
        Err(e) => {
            debug!("Not a git repository at {}: {}", path.display(), e);
            false
        }
    }
}

/// Reads project commits from local git repositories.
///
/// Only the repository of the project being read is kept open. Asking for a
/// different project closes it and opens the next one, so a run over many
/// projects holds one repository handle at a time.
///
/// Commits are walked from HEAD in topological, newest-first order. The walk
/// order is computed once per project and window. Consecutive pages resume
/// where the previous page stopped instead of walking history again.
#[derive(Default)]
pub struct GitRepositoryProvider {
    current: RefCell<Option<ProjectCursor>>,
}

/// The open repository of one project and how far its walk has gone
struct ProjectCursor {
    project_id: ProjectId,
    repo: Repository,
    walk: Option<WalkState>,
}

struct WalkState {
    after: DateTime<Utc>,
    before: DateTime<Utc>,
    order: Vec<Oid>,
    /// Index in `order` of the next commit to examine
    position: usize,
    /// In-window commits passed so far
    in_window: usize,
    /// Full walks started for this project
    walks: usize,
}

impl WalkState {
    fn resumes(&self, page: &CommitPage) -> bool {
        self.after == page.after && self.before == page.before && page.offset >= self.in_window
    }
}

impl GitRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_cursor<T>(
        &self,
        project: &Project,
        operation: impl FnOnce(&mut ProjectCursor) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut current = self.current.borrow_mut();
        if current.as_ref().map(|cursor| cursor.project_id) != Some(project.id) {
            if let Some(previous) = current.take() {
                trace!("Closing repository of project {}", previous.project_id);
            }
            *current = Some(ProjectCursor {
                project_id: project.id,
                repo: open_repository(project)?,
                walk: None,
            });
        }
        match current.as_mut() {
            Some(cursor) => operation(cursor),
            None => Err(RepositoryError::not_found(&project.path)),
        }
    }

    /// Project whose repository is currently open
    #[cfg(test)]
    fn open_project(&self) -> Option<ProjectId> {
        self.current.borrow().as_ref().map(|cursor| cursor.project_id)
    }

    /// Full history walks started for the open project
    #[cfg(test)]
    fn walks(&self) -> usize {
        self.current
            .borrow()
            .as_ref()
            .and_then(|cursor| cursor.walk.as_ref())
            .map_or(0, |walk| walk.walks)
    }
}

impl RepositoryProvider for GitRepositoryProvider {
    fn commit_by_sha(&self, project: &Arc<Project>, sha: &str) -> Result<Option<Commit>, RepositoryError> {
        if !is_commit_sha(sha) {
            debug!("Ignoring {:?}: not a full 40-character commit SHA", sha);
            return Ok(None);
        }
        let oid = match Oid::from_str(sha) {
            Ok(oid) => oid,
            Err(_) => return Ok(None),
        };

        self.with_cursor(project, |cursor| match cursor.repo.find_commit(oid) {
            Ok(commit) => Ok(Some(to_commit(&commit, project))),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(RepositoryError::corrupted(&project.path, e)),
        })
    }

    fn commits(&self, project: &Arc<Project>, page: &CommitPage) -> Result<Vec<Commit>, RepositoryError> {
        if page.limit == 0 {
            return Ok(Vec::new());
        }

        self.with_cursor(project, |cursor| {
            let ProjectCursor { repo, walk, .. } = cursor;
            // An empty repository has no HEAD to walk from
            if repo.is_empty().map_err(|e| RepositoryError::corrupted(&project.path, e))? {
                return Ok(Vec::new());
            }

            let state = match walk.take() {
                Some(state) if state.resumes(page) => state,
                previous => {
                    let walks = previous.map_or(0, |state| state.walks) + 1;
                    let Some(order) = walk_order(repo, project)? else {
                        return Ok(Vec::new());
                    };
                    WalkState {
                        after: page.after,
                        before: page.before,
                        order,
                        position: 0,
                        in_window: 0,
                        walks,
                    }
                }
            };
            let state = walk.insert(state);

            let mut commits = Vec::with_capacity(page.limit);
            while commits.len() < page.limit {
                let Some(&oid) = state.order.get(state.position) else {
                    break;
                };
                state.position += 1;

                let commit = repo
                    .find_commit(oid)
                    .map_err(|e| RepositoryError::corrupted(&project.path, e))?;
                if !page.contains(timestamp(commit.time().seconds())) {
                    continue;
                }
                state.in_window += 1;
                if state.in_window > page.offset {
                    commits.push(to_commit(&commit, project));
                }
            }

            trace!("Read {} commits from {} at offset {}", commits.len(), project.path, page.offset);
            Ok(commits)
        })
    }
}

/// Commit ids reachable from HEAD, newest first. `None` when HEAD is unborn
fn walk_order(repo: &Repository, project: &Project) -> Result<Option<Vec<Oid>>, RepositoryError> {
    let mut walk = repo
        .revwalk()
        .map_err(|e| RepositoryError::corrupted(&project.path, e))?;
    if let Err(e) = walk.push_head() {
        if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) {
            return Ok(None);
        }
        return Err(RepositoryError::corrupted(&project.path, e));
    }
    walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
        .map_err(|e| RepositoryError::corrupted(&project.path, e))?;

    debug!("Walking history of {}", project.path);
    walk.map(|oid| oid.map_err(|e| RepositoryError::corrupted(&project.path, e)))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn open_repository(project: &Project) -> Result<Repository, RepositoryError> {
    let Some(path) = project.repository.as_deref() else {
        return Err(RepositoryError::not_found(&project.path));
    };
    if !path.exists() {
        return Err(RepositoryError::not_found(&project.path));
    }

    debug!("Opening repository for {} at {}", project.path, path.display());
    Repository::open(path).map_err(|e| match e.code() {
        ErrorCode::NotFound => RepositoryError::not_found(&project.path),
        _ => RepositoryError::corrupted(&project.path, e),
    })
}

fn to_commit(commit: &git2::Commit<'_>, project: &Arc<Project>) -> Commit {
    let author = commit.author();
    let committer = commit.committer();
    Commit {
        sha: commit.id().to_string(),
        author_name: author.name().map(str::to_string),
        committer_name: committer.name().map(str::to_string),
        authored_at: timestamp(author.when().seconds()),
        committed_at: timestamp(commit.time().seconds()),
        project: Some(Arc::clone(project)),
    }
}

fn timestamp(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}

/// Full hex object id. Abbreviated ids are not resolved
fn is_commit_sha(sha: &str) -> bool {
    sha.len() == 40 && sha.chars().all(|c| c.is_ascii_hexdigit())
}

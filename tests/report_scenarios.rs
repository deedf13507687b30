//! End-to-end report runs over in-memory providers
//! Covers the row, cap, count, fan-in, failure isolation and single-SHA behaviour

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use compliance_report::report::{
    BatchSettings, Commit, CommitPage, CommitStream, CsvRow, FilterParams, Group, MergeRequest,
    MergeRequestProvider, MergeRequestQuery, Project, ProjectId, ProjectProvider, ProviderError, ReportError,
    ReportSettings, ReportSources, RepositoryError, RepositoryProvider, User,
};

fn from() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn to() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
}

fn in_window(minutes: i64) -> DateTime<Utc> {
    from() + Duration::minutes(minutes)
}

/// Projects, merge requests and repositories held in memory
struct InMemory {
    group: Group,
    projects: Vec<Arc<Project>>,
    merge_requests: Vec<MergeRequest>,
    commits: HashMap<ProjectId, Vec<Commit>>,
    missing: Vec<ProjectId>,
    pages: RefCell<Vec<(ProjectId, CommitPage)>>,
    sha_lookups: RefCell<Vec<(ProjectId, String)>>,
}

impl InMemory {
    fn new() -> Self {
        Self {
            group: Group::new(1, "G", "g"),
            projects: Vec::new(),
            merge_requests: Vec::new(),
            commits: HashMap::new(),
            missing: Vec::new(),
            pages: RefCell::new(Vec::new()),
            sha_lookups: RefCell::new(Vec::new()),
        }
    }

    fn project(&mut self, id: ProjectId, name: &str, commits: Vec<Commit>) -> Arc<Project> {
        let project = Arc::new(Project::new(id, name, &self.group));
        self.projects.push(Arc::clone(&project));
        self.commits.insert(id, commits);
        project
    }

    fn merged(&mut self, id: u64, project: &Project, shas: &[&str]) -> &mut MergeRequest {
        let mut mr = MergeRequest::new(id, id, project);
        mr.commit_shas = shas.iter().map(|s| s.to_string()).collect();
        mr.merged_at = Some(in_window(60 * 24 * 10));
        mr.merged_by = Some(User::new(2, "Merger"));
        self.merge_requests.push(mr);
        self.merge_requests.last_mut().unwrap()
    }

    fn pages_for(&self, project: ProjectId) -> Vec<CommitPage> {
        self.pages
            .borrow()
            .iter()
            .filter(|(id, _)| *id == project)
            .map(|(_, page)| *page)
            .collect()
    }
}

impl ProjectProvider for InMemory {
    fn projects(&self, _group: &Group, _include_subgroups: bool) -> Result<Vec<Arc<Project>>, ProviderError> {
        Ok(self.projects.clone())
    }
}

impl MergeRequestProvider for InMemory {
    fn merged_merge_requests(&self, query: &MergeRequestQuery<'_>) -> Result<Vec<MergeRequest>, ProviderError> {
        let hierarchy = compliance_report::report::GroupHierarchy::new([&self.group]);
        Ok(self
            .merge_requests
            .iter()
            .filter(|mr| query.matches(mr, &hierarchy))
            .cloned()
            .collect())
    }
}

impl RepositoryProvider for InMemory {
    fn commit_by_sha(&self, project: &Arc<Project>, sha: &str) -> Result<Option<Commit>, RepositoryError> {
        self.sha_lookups.borrow_mut().push((project.id, sha.to_string()));
        if self.missing.contains(&project.id) {
            return Err(RepositoryError::not_found(project.path.clone()));
        }
        Ok(self
            .commits
            .get(&project.id)
            .and_then(|commits| commits.iter().find(|c| c.sha == sha).cloned()))
    }

    fn commits(&self, project: &Arc<Project>, page: &CommitPage) -> Result<Vec<Commit>, RepositoryError> {
        self.pages.borrow_mut().push((project.id, *page));
        if self.missing.contains(&project.id) {
            return Err(RepositoryError::not_found(project.path.clone()));
        }
        Ok(self
            .commits
            .get(&project.id)
            .map(|commits| {
                commits
                    .iter()
                    .filter(|c| page.contains(c.committed_at))
                    .skip(page.offset)
                    .take(page.limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// A row reduced to the parts the assertions care about
#[derive(Debug, Clone, PartialEq)]
struct Seen {
    sha: String,
    merge_request: Option<u64>,
    project: Option<String>,
}

fn run(data: &InMemory, settings: ReportSettings, filters: FilterParams) -> (Vec<Seen>, usize) {
    let mut stream = CommitStream::builder(ReportSources::new(data, data, data))
        .group(data.group.clone())
        .user(User::new(9, "Auditor"))
        .filters(filters)
        .settings(settings)
        .now(to())
        .build()
        .unwrap();

    let mut seen = Vec::new();
    stream
        .find_each(|row: &CsvRow<'_>| -> Result<(), ReportError> {
            seen.push(Seen {
                sha: row.sha().to_string(),
                merge_request: row.merge_request_id(),
                project: row.project_name().map(str::to_string),
            });
            Ok(())
        })
        .unwrap();
    let count = stream.count();
    (seen, count)
}

fn window_filters() -> FilterParams {
    FilterParams::new().from(from()).to(to())
}

#[test]
fn in_window_commit_joined_with_its_merge_request() {
    let mut data = InMemory::new();
    let project = data.project(
        10,
        "P",
        vec![
            Commit::new("c1", in_window(5)),
            Commit::new("c2", from() - Duration::days(3)),
        ],
    );
    data.merged(100, &project, &["c1"]);

    let (rows, count) = run(&data, ReportSettings::default(), window_filters());

    assert_eq!(
        rows,
        vec![Seen {
            sha: "c1".to_string(),
            merge_request: Some(100),
            project: Some("P".to_string()),
        }]
    );
    assert_eq!(count, 1);
}

#[test]
fn commit_without_merge_request_gets_one_row() {
    let mut data = InMemory::new();
    data.project(
        10,
        "P",
        vec![
            Commit::new("c1", in_window(5)),
            Commit::new("c2", from() - Duration::days(3)),
        ],
    );

    let (rows, count) = run(&data, ReportSettings::default(), window_filters());

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].sha, "c1");
    assert_eq!(rows[0].merge_request, None);
    assert_eq!(count, 1);
}

#[test]
fn cap_reached_over_eleven_batches() {
    let mut data = InMemory::new();
    let commits = (0..1500).map(|i| Commit::new(format!("c{i}"), in_window(i))).collect();
    data.project(10, "P", commits);

    let settings = ReportSettings {
        batch: BatchSettings::new(1024, 100),
        include_subgroups: true,
    };
    let (rows, count) = run(&data, settings, window_filters());

    assert_eq!(rows.len(), 1024);
    assert_eq!(count, 1024);
    let pages = data.pages_for(10);
    assert_eq!(pages.len(), 11);
    assert!(pages[..10].iter().all(|page| page.limit == 100));
    assert_eq!(pages[10].offset, 1000);
    assert_eq!(pages[10].limit, 24);
}

#[test]
fn single_sha_ignores_cap_and_batching() {
    let mut data = InMemory::new();
    let mut commits: Vec<Commit> = (0..50).map(|i| Commit::new(format!("c{i}"), in_window(i))).collect();
    commits.push(Commit::new("abc123", in_window(100)));
    data.project(10, "P", commits);

    for batch in [BatchSettings::new(1, 1), BatchSettings::new(1024, 100), BatchSettings::new(3, 7)] {
        let settings = ReportSettings {
            batch,
            include_subgroups: true,
        };
        let (rows, count) = run(&data, settings, window_filters().commit_sha("abc123"));
        assert_eq!(rows.len(), 1, "settings {:?}", batch);
        assert_eq!(rows[0].sha, "abc123");
        assert_eq!(count, 1);
    }
    assert!(data.pages.borrow().is_empty(), "single-SHA runs never page");
}

#[test]
fn commit_with_several_merge_requests_yields_one_row_each() {
    let mut data = InMemory::new();
    let project = data.project(
        10,
        "P",
        vec![Commit::new("shared", in_window(1)), Commit::new("lonely", in_window(2))],
    );
    data.merged(1, &project, &["shared"]);
    data.merged(2, &project, &["shared"]);
    data.merged(3, &project, &["x", "shared"]);

    let (rows, count) = run(&data, ReportSettings::default(), window_filters());

    let mut shared: Vec<u64> = rows
        .iter()
        .filter(|r| r.sha == "shared")
        .filter_map(|r| r.merge_request)
        .collect();
    shared.sort_unstable();
    assert_eq!(shared, vec![1, 2, 3]);

    let lonely: Vec<&Seen> = rows.iter().filter(|r| r.sha == "lonely").collect();
    assert_eq!(lonely.len(), 1);
    assert_eq!(lonely[0].merge_request, None);
    assert_eq!(count, 4);
}

#[test]
fn cap_holds_for_every_batch_size() {
    for batch_size in [1, 7, 100, 333, 5000] {
        let mut data = InMemory::new();
        let commits = (0..120).map(|i| Commit::new(format!("c{i}"), in_window(i))).collect();
        data.project(10, "P", commits);

        let settings = ReportSettings {
            batch: BatchSettings::new(50, batch_size),
            include_subgroups: true,
        };
        let (rows, _) = run(&data, settings, window_filters());
        assert_eq!(rows.len(), 50, "batch size {}", batch_size);

        let requested: usize = data.pages_for(10).iter().map(|p| p.limit).sum();
        assert!(requested <= 50, "batch size {} requested {} commits", batch_size, requested);
    }
}

#[test]
fn count_matches_rows_across_projects() {
    let mut data = InMemory::new();
    let api = data.project(
        10,
        "api",
        vec![Commit::new("a1", in_window(1)), Commit::new("a2", in_window(2))],
    );
    let web = data.project(11, "web", vec![Commit::new("w1", in_window(3))]);
    data.merged(1, &api, &["a1"]);
    data.merged(2, &web, &["a1", "w1"]);

    let (rows, count) = run(&data, ReportSettings::default(), window_filters());

    // a1 has two merge requests, a2 none, w1 one
    assert_eq!(rows.len(), 4);
    assert_eq!(count, rows.len());
}

#[test]
fn identical_merge_squash_and_commit_sha_counted_once() {
    let mut data = InMemory::new();
    let project = data.project(10, "P", vec![Commit::new("same", in_window(1))]);
    let mr = data.merged(7, &project, &["same"]);
    mr.squash_commit_sha = Some("same".to_string());
    mr.merge_commit_sha = Some("same".to_string());

    let (rows, count) = run(&data, ReportSettings::default(), window_filters());

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].merge_request, Some(7));
    assert_eq!(count, 1);
}

#[test]
fn missing_repository_does_not_stop_later_projects() {
    let mut data = InMemory::new();
    data.project(10, "ghost", vec![Commit::new("g1", in_window(1))]);
    data.project(11, "real", vec![Commit::new("r1", in_window(1))]);
    data.missing.push(10);

    let mut stream = CommitStream::builder(ReportSources::new(&data, &data, &data))
        .group(data.group.clone())
        .user(User::new(9, "Auditor"))
        .filters(window_filters())
        .now(to())
        .build()
        .unwrap();

    let mut shas = Vec::new();
    stream
        .find_each(|row| -> Result<(), ReportError> {
            shas.push(row.sha().to_string());
            Ok(())
        })
        .unwrap();

    assert_eq!(shas, vec!["r1"]);
    assert_eq!(stream.count(), 1);
    let summaries = stream.summaries();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].rows, 0);
    assert!(summaries[0].repository_error.is_some());
    assert_eq!(summaries[1].rows, 1);
    assert!(summaries[1].repository_error.is_none());
}

#[test]
fn absent_sha_yields_nothing_and_never_pages() {
    let mut data = InMemory::new();
    data.project(10, "api", vec![Commit::new("c1", in_window(1))]);
    data.project(11, "web", vec![Commit::new("c2", in_window(1))]);

    let (rows, count) = run(&data, ReportSettings::default(), window_filters().commit_sha("deadbeef"));

    assert!(rows.is_empty());
    assert_eq!(count, 0);
    assert!(data.pages.borrow().is_empty());
    assert_eq!(data.sha_lookups.borrow().len(), 2, "one lookup per project");
}

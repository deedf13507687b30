//! Report Performance Benchmarks
//!
//! Measures merge request index construction and end-to-end streaming over
//! synthetic in-memory sources, including CSV encoding of every row.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use compliance_report::output::CsvExporter;
use compliance_report::report::{
    BatchSettings, Commit, CommitPage, CommitStream, FilterParams, Group, GroupHierarchy, MergeRequest,
    MergeRequestIndex, MergeRequestProvider, MergeRequestQuery, Project, ProjectProvider, ProviderError,
    ReportError, ReportSettings, ReportSources, RepositoryError, RepositoryProvider, User, Window,
};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Projects with `commits_per_project` commits each, every third commit merged through an MR
struct SyntheticSources {
    group: Group,
    projects: Vec<Arc<Project>>,
    commits: Vec<Commit>,
    merge_requests: Vec<MergeRequest>,
}

impl SyntheticSources {
    fn new(project_count: u64, commits_per_project: usize) -> Self {
        let group = Group::new(1, "Bench", "bench");
        let projects: Vec<Arc<Project>> = (0..project_count)
            .map(|id| Arc::new(Project::new(id, format!("project-{}", id), &group)))
            .collect();
        let commits: Vec<Commit> = (0..commits_per_project)
            .map(|i| {
                Commit::new(format!("{:040x}", i), start() + Duration::seconds(i as i64))
                    .authored_by("Bench Author")
            })
            .collect();

        let mut merge_requests = Vec::new();
        for project in &projects {
            for (i, chunk) in commits.chunks(3).enumerate() {
                let mut mr = MergeRequest::new(project.id * 100_000 + i as u64, i as u64, project);
                mr.commit_shas = vec![chunk[0].sha.clone()];
                mr.merged_at = Some(start() + Duration::days(1));
                mr.approvers = vec![User::new(2, "Reviewer"), User::new(1, "Approver")];
                merge_requests.push(mr);
            }
        }

        Self {
            group,
            projects,
            commits,
            merge_requests,
        }
    }

    fn window() -> Window {
        Window::new(start(), start() + Duration::days(30), None).unwrap()
    }
}

impl ProjectProvider for SyntheticSources {
    fn projects(&self, _group: &Group, _include_subgroups: bool) -> Result<Vec<Arc<Project>>, ProviderError> {
        Ok(self.projects.clone())
    }
}

impl MergeRequestProvider for SyntheticSources {
    fn merged_merge_requests(&self, query: &MergeRequestQuery<'_>) -> Result<Vec<MergeRequest>, ProviderError> {
        let hierarchy = GroupHierarchy::new([&self.group]);
        Ok(self
            .merge_requests
            .iter()
            .filter(|mr| query.matches(mr, &hierarchy))
            .cloned()
            .collect())
    }
}

impl RepositoryProvider for SyntheticSources {
    fn commit_by_sha(&self, _project: &Arc<Project>, sha: &str) -> Result<Option<Commit>, RepositoryError> {
        Ok(self.commits.iter().find(|c| c.sha == sha).cloned())
    }

    fn commits(&self, _project: &Arc<Project>, page: &CommitPage) -> Result<Vec<Commit>, RepositoryError> {
        Ok(self.commits.iter().skip(page.offset).take(page.limit).cloned().collect())
    }
}

/// Benchmark building the SHA index from merged merge requests
fn bench_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");

    for projects in [1, 10, 50] {
        let sources = SyntheticSources::new(projects, 1000);
        let window = SyntheticSources::window();
        let query = MergeRequestQuery::new(&sources.group, true, &window);

        group.throughput(Throughput::Elements(sources.merge_requests.len() as u64));
        group.bench_with_input(BenchmarkId::new("projects", projects), &projects, |b, _| {
            b.iter(|| {
                let index = MergeRequestIndex::build(&sources, &query).unwrap();
                black_box(index.len())
            })
        });
    }

    group.finish();
}

/// Benchmark a full run with rows counted but not encoded
fn bench_stream_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_rows");

    for batch_size in [10, 100, 500] {
        let sources = SyntheticSources::new(10, 1024);
        let settings = ReportSettings {
            batch: BatchSettings::new(1024, batch_size),
            include_subgroups: true,
        };

        group.throughput(Throughput::Elements(10 * 1024));
        group.bench_with_input(BenchmarkId::new("batch_size", batch_size), &batch_size, |b, _| {
            b.iter(|| {
                let mut stream = CommitStream::builder(ReportSources::new(&sources, &sources, &sources))
                    .group(sources.group.clone())
                    .user(User::new(1, "Bench"))
                    .filters(FilterParams::new().from(start()).to(start() + Duration::days(30)))
                    .settings(settings)
                    .now(start() + Duration::days(30))
                    .build()
                    .unwrap();
                stream
                    .find_each(|row| -> Result<(), ReportError> {
                        black_box(row.sha());
                        Ok(())
                    })
                    .unwrap();
                black_box(stream.count())
            })
        });
    }

    group.finish();
}

/// Benchmark a full run written through the CSV exporter
fn bench_stream_to_csv(c: &mut Criterion) {
    let sources = SyntheticSources::new(5, 1024);

    c.benchmark_group("stream_to_csv")
        .throughput(Throughput::Elements(5 * 1024))
        .bench_function("sink", |b| {
            b.iter(|| {
                let mut exporter = CsvExporter::new(io::sink(), None).unwrap();
                let mut stream = CommitStream::builder(ReportSources::new(&sources, &sources, &sources))
                    .group(sources.group.clone())
                    .user(User::new(1, "Bench"))
                    .filters(FilterParams::new().from(start()).to(start() + Duration::days(30)))
                    .now(start() + Duration::days(30))
                    .build()
                    .unwrap();
                stream
                    .find_each(|row| -> anyhow::Result<()> {
                        exporter.write_row(row)?;
                        Ok(())
                    })
                    .unwrap();
                black_box(exporter.finish().unwrap().0)
            })
        });
}

criterion_group!(benches, bench_index_build, bench_stream_rows, bench_stream_to_csv);
criterion_main!(benches);

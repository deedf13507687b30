//! Compliance Report Engine
//!
//! Streams a group's commits joined with the merge requests that introduced
//! them, one row at a time, without ever holding a project's full history.
//!
//! ```text
//! CommitStream::find_each
//! ├── MergeRequestIndex::build      (once, eager)
//! └── for each project
//!     └── CommitBatchIterator       (bounded pages, per-project cap)
//!         └── CsvRow -> sink        (one row per associated merge request)
//! ```
//!
//! ```rust,no_run
//! use compliance_report::report::{CommitStream, FilterParams, ReportSources};
//! # fn run(sources: ReportSources<'_>, group: compliance_report::report::Group, user: compliance_report::report::User) -> anyhow::Result<()> {
//! let mut stream = CommitStream::builder(sources)
//!     .group(group)
//!     .user(user)
//!     .filters(FilterParams::default())
//!     .build()?;
//!
//! stream.find_each(|row| {
//!     println!("{}", row.sha());
//!     Ok::<_, anyhow::Error>(())
//! })?;
//! println!("{} rows", stream.count());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod count;
pub mod error;
pub mod index;
pub mod model;
pub mod providers;
pub mod row;
pub mod stream;
pub mod window;

pub use batch::{BatchSettings, CommitBatchIterator, DEFAULT_BATCH_SIZE, DEFAULT_COMMIT_CAP};
pub use count::RunCount;
pub use error::{ProviderError, ReportError, ReportResult, RepositoryError};
pub use index::{MergeRequestIndex, MergeRequestIndexBuilder};
pub use model::{Commit, Group, GroupHierarchy, GroupId, MergeRequest, Project, ProjectId, User};
pub use providers::{
    CommitPage, MergeRequestProvider, MergeRequestQuery, ProjectProvider, ReportSources, RepositoryProvider,
};
pub use row::{Association, CsvRow, APPROVER_SEPARATOR};
pub use stream::{CommitStream, CommitStreamBuilder, ProjectSummary, ReportSettings};
pub use window::{FilterParams, Window};

//! Application orchestration module

pub mod execution;
pub mod initialization;

pub use execution::run_report;
pub use initialization::{configure_logging, load_configuration, resolve_report_config};

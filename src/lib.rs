pub mod app;
pub mod cli;
pub mod config;
pub mod git;
pub mod logging;
pub mod manifest;
pub mod output;
pub mod report;

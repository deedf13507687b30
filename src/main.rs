use std::process;

use anyhow::Result;
use log::error;

use compliance_report::{app, cli, logging};

fn main() {
    if let Err(e) = run() {
        error!("Report failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = cli::args::parse_args();

    cli::args::validate_args(&args)?;

    let config_manager = app::load_configuration(&args)?;

    let log_config = app::configure_logging(&args, &config_manager)?;
    logging::init_logger(log_config)?;

    let report_config = app::resolve_report_config(&args, &config_manager)?;
    app::run_report(&args, report_config)
}

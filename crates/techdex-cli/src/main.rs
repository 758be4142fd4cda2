mod chart;
mod cli;
mod config;
mod error;
mod logging;
mod output;
mod pipeline;

use std::process::ExitCode;

use clap::Parser;
use techdex_core::TradingDate;
use tracing::info;

use crate::cli::Cli;
use crate::config::RunConfig;
use crate::error::CliError;

fn main() -> ExitCode {
    logging::init_tracing();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let config = RunConfig::from_cli(&cli, TradingDate::today_utc())?;

    // The runtime is dropped before the window opens; the GUI owns the main thread.
    let outcome = {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(pipeline::run(&config))?
    };

    output::render(&outcome, config.format, config.pretty)?;

    if config.chart {
        info!("opening chart window");
        chart::show(outcome, config.chart_constituents)?;
    }

    Ok(())
}

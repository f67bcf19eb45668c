use std::process::ExitCode;

use clap::Parser;
use log::*;

use prusacam::config::log_destination;
use prusacam::prelude::*;

// 1. Read and validate the settings
// 2. Set up logging
// 3. Open the image directory, the HTTP clients and the camera
// 4. Loop until Ctrl-C or until the printer refuses a status request
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let fallback_name = cli.name.clone();
    let fallback_log = cli.log_file.clone();

    let session = Session::load(cli);

    // The logger goes up before the settings are checked so a bad setting gets logged too
    let (name, log_file) = match &session {
        Ok(s) => (s.name.clone(), s.log_file.clone()),
        Err(_) => {
            let log_file = log_destination(fallback_log, &fallback_name);
            (fallback_name, log_file)
        }
    };
    let reporter = match Reporter::init(&name, log_file.as_deref()) {
        Ok(reporter) => reporter,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let session = match session {
        Ok(session) => session,
        Err(e) => {
            reporter.critical(&e);
            return ExitCode::FAILURE;
        }
    };

    reporter.started();
    session.log_summary();

    let mut scheduler = match Scheduler::start(&session, reporter.clone()).await {
        Ok(scheduler) => scheduler,
        Err(e) => {
            reporter.critical(&e);
            return ExitCode::FAILURE;
        }
    };

    let result = scheduler.run_until(tokio::signal::ctrl_c()).await;

    scheduler.shutdown();
    debug!("Final counts: {:?}", reporter.stats());

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            reporter.critical(&e);
            ExitCode::FAILURE
        }
    }
}

use std::process::ExitCode;

use strategos_engine::run_headless;
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(mut app: AppWiring) -> ExitCode {
    match run_headless(app.config, &mut app.host) {
        Ok(summary) => {
            info!(
                ticks = summary.ticks,
                system_failures = summary.system_failures,
                reason = ?summary.reason,
                "run_finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}

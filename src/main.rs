//! autocommitter binary entry point.

use std::process::ExitCode;

use autocommitter::ui::output;

fn main() -> ExitCode {
    match autocommitter::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::error(format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}

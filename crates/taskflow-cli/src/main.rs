use std::process::ExitCode;

fn main() -> ExitCode {
    match taskflow_core::run(std::env::args_os().collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("taskflow: {err:#}");
            ExitCode::FAILURE
        }
    }
}

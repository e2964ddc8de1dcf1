use std::process::ExitCode;

fn main() -> ExitCode {
    match gmode_match::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

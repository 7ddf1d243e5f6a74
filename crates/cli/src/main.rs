use std::process::ExitCode;

fn main() -> ExitCode {
    movely_cli::run()
}

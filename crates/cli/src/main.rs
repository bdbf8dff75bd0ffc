use std::process::ExitCode;

fn main() -> ExitCode {
    slack2doc_cli::run()
}

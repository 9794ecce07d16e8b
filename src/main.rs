// src/main.rs

use std::process::ExitCode;

use bgworker::{cli, logging, run};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("bgworker: {err:?}");
    }

    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("bgworker error [{}]: {err}", err.kind());
            ExitCode::FAILURE
        }
    }
}

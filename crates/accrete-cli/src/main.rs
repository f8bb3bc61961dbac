//! `accrete` command line entry point

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let matches = accrete_cli::cli().get_matches();
    accrete_cli::init_tracing(&matches);

    match accrete_cli::execute(&matches).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

use env_logger::Env;
use std::process::ExitCode;

use modscan::cli::{build_cli, handle_command};

#[tokio::main]
async fn main() -> ExitCode {
    let matches = build_cli().get_matches();

    let default_level = if matches.get_flag("verbose") { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    match handle_command(&matches).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

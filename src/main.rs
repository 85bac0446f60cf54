mod cli;
mod config;
mod container;
mod deploy;
mod logging;
mod nginx;
mod os;
mod output;
mod params;
mod prompt;
mod repo;
mod ssh;

use clap::Parser;
use std::process::ExitCode;
use tracing::info;

use cli::Cli;
use config::DockhandConfig;
use params::InputError;
use prompt::TermPrompter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match DockhandConfig::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            output::error(&format!("{:#}", e));
            return ExitCode::FAILURE;
        }
    };

    let log_dir = cli
        .log_dir
        .clone()
        .unwrap_or_else(|| config.local.log_dir.clone());
    let log_path = match logging::LogFile::create(&log_dir).and_then(|log_file| {
        let path = log_file.path().to_path_buf();
        logging::init(cli.verbose, log_file).map(|()| path)
    }) {
        Ok(path) => path,
        Err(e) => {
            output::error(&format!("{:#}", e));
            return ExitCode::FAILURE;
        }
    };

    info!(
        "dockhand {} starting ({})",
        env!("CARGO_PKG_VERSION"),
        if cli.cleanup { "cleanup" } else { "deploy" }
    );

    let mut prompter = TermPrompter;
    let (result, action) = if cli.cleanup {
        let result = cli::cleanup::run(&mut prompter, &config).await;
        (result.map(|outcome| info!("cleanup outcome: {:?}", outcome)), "Cleanup")
    } else {
        let result = cli::deploy::run(&mut prompter, config, log_path.clone()).await;
        (result, "Deployment")
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<InputError>() {
                Some(input) => output::error(&input.to_string()),
                None => output::error(&format!("{:#}", e)),
            }
            output::error(&format!(
                "{} failed. Check the log file for details: {}",
                action,
                log_path.display()
            ));
            ExitCode::FAILURE
        }
    }
}

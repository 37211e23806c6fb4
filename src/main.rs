use std::process::ExitCode;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tadershoy::{Cli, Config, LoggingConfig, init_logging};

fn main() -> ExitCode {
    init_logging(LoggingConfig::default());

    let Some(config) = Config::from_cli(Cli::parse()) else {
        eprintln!("{}", Cli::command().render_usage());
        return ExitCode::SUCCESS;
    };

    if let Err(error) = preview(config) {
        log::error!("{:#}", error);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn preview(config: Config) -> anyhow::Result<()> {
    let path = config.path.display().to_string();
    tadershoy::run(config).with_context(|| format!("cannot preview {path}"))
}

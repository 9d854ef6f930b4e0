use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cl_cli::cli::{self, Cli, Command, ConfigCommand};
use cl_domain::config::ObservabilityConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let workdir = cli::resolve_workdir(args.global.workdir.as_deref())?;
    let (mut config, config_path) = cli::load_config(&workdir)?;
    cli::apply_overrides(&mut config, &args.global);
    init_tracing(&config.observability);

    match args.command {
        // Default to chat when no subcommand is given.
        None | Some(Command::Chat) => cli::chat::chat(Arc::new(config), &workdir).await,
        Some(Command::Run { message, json }) => cli::run::run(Arc::new(config), &workdir, message, json).await,
        Some(Command::History { clear }) => cli::history::history(&config, &workdir, clear).await,
        Some(Command::Config(ConfigCommand::Validate)) => {
            if !cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => cli::config::show(&config),
    }
}

/// Stderr-only tracing so diagnostics never mix with streamed answers.
///
/// `RUST_LOG` wins over `observability.log_filter`.
fn init_tracing(obs: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&obs.log_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if obs.json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

pub mod chat;
pub mod config;
pub mod confirm;
pub mod history;
pub mod run;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use cl_domain::config::Config;

/// codeloop: a coding assistant that works in your terminal.
#[derive(Debug, Parser)]
#[command(name = "codeloop", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Working directory the tools operate in (defaults to the current one).
    #[arg(short = 'C', long, global = true)]
    pub workdir: Option<PathBuf>,
    /// Model override (e.g. "grok-code-fast-1", "o3").
    #[arg(short, long, global = true)]
    pub model: Option<String>,
    /// Provider id override (e.g. "openai", "mistral").
    #[arg(long, global = true)]
    pub provider: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive chat (default when no subcommand is given).
    Chat,
    /// Send a single message, stream the answer, and exit.
    Run {
        /// The message to send.
        message: String,
        /// Print every stream chunk as one JSON line instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Show the persisted conversation of the working directory.
    History {
        /// Delete it instead.
        #[arg(long)]
        clear: bool,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Resolve the working directory from `--workdir` or the process cwd.
pub fn resolve_workdir(arg: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = match arg {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().context("reading current directory")?,
    };
    dir.canonicalize()
        .with_context(|| format!("working directory {}", dir.display()))
}

/// Load the configuration from `CODELOOP_CONFIG`, or
/// `.codeloop/config.toml` under `workdir`. A missing file yields the
/// defaults. Returns the config and the path that was used.
pub fn load_config(workdir: &Path) -> anyhow::Result<(Config, PathBuf)> {
    let config_path = std::env::var_os("CODELOOP_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| workdir.join(".codeloop").join("config.toml"));

    let config = if config_path.exists() {
        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        parse_config(&raw).with_context(|| format!("parsing {}", config_path.display()))?
    } else {
        Config::default()
    };

    Ok((config, config_path))
}

pub fn parse_config(raw: &str) -> anyhow::Result<Config> {
    Ok(toml::from_str(raw)?)
}

/// Apply `--model` / `--provider` on top of the file config.
pub fn apply_overrides(config: &mut Config, global: &GlobalArgs) {
    if let Some(model) = &global.model {
        config.llm.model = model.clone();
    }
    if let Some(provider) = &global.provider {
        config.llm.provider = Some(provider.clone());
    }
}

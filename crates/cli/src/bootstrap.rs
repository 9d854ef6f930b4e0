//! Agent construction shared by the `chat`, `run`, and `history` commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use cl_agent::{initial_binding, Agent, AgentParts, Confirmer};
use cl_domain::config::{Config, ConfigSeverity};
use cl_providers::ProviderRegistry;
use cl_sessions::{session_id_for_workdir, ChatStore, JsonlChatStore, MemoryChatStore};

/// Fail on config errors, log warnings.
pub fn check_config(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }
    Ok(())
}

/// Directory holding the transcripts, relative paths resolved under
/// `workdir`.
pub fn sessions_dir(config: &Config, workdir: &Path) -> PathBuf {
    if config.sessions.dir.is_absolute() {
        config.sessions.dir.clone()
    } else {
        workdir.join(&config.sessions.dir)
    }
}

/// The transcript of `workdir`, or a throwaway store when persistence is
/// off.
pub fn open_store(config: &Config, workdir: &Path) -> Arc<dyn ChatStore> {
    if !config.agent.persist_session {
        return Arc::new(MemoryChatStore::new());
    }
    let session_id = session_id_for_workdir(workdir);
    let store = JsonlChatStore::new(&sessions_dir(config, workdir), &session_id);
    tracing::debug!(path = %store.path().display(), "session transcript");
    Arc::new(store)
}

/// Validate config, wire providers, tools, and the store, and return a
/// ready agent. The previous conversation is restored when configured.
/// Without a `confirmer`, mutating tools run unasked.
pub async fn build_agent(
    config: &Config,
    workdir: &Path,
    confirmer: Option<Arc<dyn Confirmer>>,
) -> anyhow::Result<Arc<Agent>> {
    check_config(config)?;

    // ── LLM providers ────────────────────────────────────────────────
    let registry = Arc::new(ProviderRegistry::from_config(&config.llm));
    let binding = initial_binding(registry.as_ref(), &config.llm.model, config.llm.provider.as_deref())
        .context("binding the startup model")?;
    tracing::info!(provider = %binding.provider_id, model = %binding.model, "model ready");

    // ── Tools ────────────────────────────────────────────────────────
    let tools = Arc::new(cl_tools::builtin_registry(workdir, &config.tools));
    tracing::debug!(tools = tools.len(), "tools registered");

    // ── Agent ────────────────────────────────────────────────────────
    let store = open_store(config, workdir);
    let mut parts = AgentParts::from_config(config, binding, registry, tools, store, workdir);
    parts.confirmer = confirmer;
    let agent = Arc::new(Agent::new(parts));

    if config.agent.persist_session && config.agent.auto_restore_session {
        match agent.restore_from_history().await {
            Ok(0) => {}
            Ok(n) => tracing::info!(entries = n, "restored previous conversation"),
            Err(e) => tracing::warn!(error = %e, "could not restore previous conversation"),
        }
    }
    Ok(agent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_sessions_dir_lives_under_workdir() {
        let config = Config::default();
        let dir = sessions_dir(&config, Path::new("/work/repo"));
        assert_eq!(dir, Path::new("/work/repo/.codeloop/sessions"));
    }

    #[test]
    fn zero_rounds_is_rejected() {
        let mut config = Config::default();
        config.agent.max_tool_rounds = 0;
        assert!(check_config(&config).is_err());
        assert!(check_config(&Config::default()).is_ok());
    }

    #[tokio::test]
    async fn store_follows_persist_flag() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.agent.persist_session = false;
        let store = open_store(&config, dir.path());
        store
            .append(&cl_domain::chat::ChatEntry::user("hi"))
            .await
            .unwrap();
        assert!(!sessions_dir(&config, dir.path()).exists());
    }
}

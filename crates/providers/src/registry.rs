//! Provider registry.
//!
//! Holds the effective provider table (built-ins merged with config),
//! detects which provider serves a model, resolves aliases to official
//! model ids, and instantiates the transport for the active model.

use std::sync::Arc;

use cl_domain::config::{LlmConfig, ProviderConfig};
use cl_domain::error::{Error, Result};

use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;

/// A model id bound to the provider that serves it.
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub provider: ProviderConfig,
    /// Official model id (after alias resolution).
    pub model: String,
}

impl ResolvedModel {
    /// Whether tool-result messages must carry the tool name.
    pub fn requires_tool_result_name(&self) -> bool {
        self.provider.tool_result_name
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProviderRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ProviderRegistry {
    llm: LlmConfig,
    providers: Vec<ProviderConfig>,
}

impl ProviderRegistry {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            providers: config.effective_providers(),
            llm: config.clone(),
        }
    }

    /// Look up a provider by its config id.
    pub fn get(&self, provider_id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == provider_id)
    }

    /// Provider claiming `model` by prefix or alias.
    pub fn detect(&self, model: &str) -> Option<&ProviderConfig> {
        self.providers
            .iter()
            .find(|p| p.serves(model) || p.aliases.contains_key(model))
    }

    /// Provider whose endpoint matches `base_url` (trailing slash ignored).
    pub fn detect_by_base_url(&self, base_url: &str) -> Option<&ProviderConfig> {
        let wanted = base_url.trim_end_matches('/');
        self.providers
            .iter()
            .find(|p| p.base_url.trim_end_matches('/').eq_ignore_ascii_case(wanted))
    }

    /// Bind `model` to a provider.
    ///
    /// An explicit `provider_id` wins; otherwise the provider is detected
    /// from the model name.
    pub fn resolve(&self, model: &str, provider_id: Option<&str>) -> Result<ResolvedModel> {
        let provider = match provider_id {
            Some(id) => self
                .get(id)
                .ok_or_else(|| Error::Config(format!("unknown provider '{id}'")))?,
            None => self.detect(model).ok_or_else(|| {
                Error::Config(format!(
                    "no provider serves model '{model}'; set llm.provider or add model_prefixes"
                ))
            })?,
        };

        Ok(ResolvedModel {
            model: provider.resolve_model(model).to_owned(),
            provider: provider.clone(),
        })
    }

    /// Instantiate the transport for a resolved model.
    pub fn build(&self, resolved: &ResolvedModel) -> Result<Arc<dyn LlmProvider>> {
        let provider = OpenAiCompatProvider::from_config(&resolved.provider, &self.llm, &resolved.model)?;
        tracing::info!(
            provider_id = %resolved.provider.id,
            model = %resolved.model,
            "LLM provider ready"
        );
        Ok(Arc::new(provider))
    }

    /// List all provider ids (sorted).
    pub fn list_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.iter().map(|p| p.id.clone()).collect();
        ids.sort();
        ids
    }

    pub fn llm_config(&self) -> &LlmConfig {
        &self.llm
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ProviderRegistry {
        ProviderRegistry::from_config(&LlmConfig::default())
    }

    #[test]
    fn detects_provider_from_model_name() {
        let reg = registry();
        assert_eq!(reg.detect("grok-code-fast-1").unwrap().id, "grok");
        assert_eq!(reg.detect("claude-sonnet-4-5").unwrap().id, "claude");
        assert_eq!(reg.detect("o3-mini").unwrap().id, "openai");
        assert_eq!(reg.detect("deepseek-chat").unwrap().id, "deepseek");
        assert_eq!(reg.detect("devstral-small").unwrap().id, "mistral");
        assert!(reg.detect("llama-3").is_none());
    }

    #[test]
    fn detects_provider_from_base_url() {
        let reg = registry();
        assert_eq!(reg.detect_by_base_url("https://api.x.ai/v1/").unwrap().id, "grok");
        assert!(reg.detect_by_base_url("http://localhost:1234").is_none());
    }

    #[test]
    fn resolve_maps_alias_to_official_name() {
        let resolved = registry().resolve("sonnet", None).unwrap();
        assert_eq!(resolved.provider.id, "claude");
        assert_eq!(resolved.model, "claude-sonnet-4-5");
    }

    #[test]
    fn explicit_provider_overrides_detection() {
        let resolved = registry().resolve("gpt-4o", Some("mistral")).unwrap();
        assert_eq!(resolved.provider.id, "mistral");
        assert!(resolved.requires_tool_result_name());
    }

    #[test]
    fn unknown_model_or_provider_is_config_error() {
        let reg = registry();
        assert!(matches!(reg.resolve("llama-3", None), Err(Error::Config(_))));
        assert!(matches!(reg.resolve("gpt-4o", Some("nope")), Err(Error::Config(_))));
    }
}

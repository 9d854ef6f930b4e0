//! The active model and the transport that serves it.

use std::sync::Arc;

use cl_domain::error::{Error, Result};
use cl_providers::{LlmProvider, ProviderRegistry};

/// A model id bound to a live transport.
#[derive(Clone)]
pub struct ModelBinding {
    pub provider: Arc<dyn LlmProvider>,
    pub provider_id: String,
    /// Official model id sent on the wire.
    pub model: String,
    /// Tool-result messages must carry the tool name.
    pub tool_result_name: bool,
}

/// Builds bindings on model or provider switches.
pub trait TransportFactory: Send + Sync {
    /// Bind `model`, on `provider_id` when given, else on the provider
    /// detected from the model name.
    fn bind(&self, model: &str, provider_id: Option<&str>) -> Result<ModelBinding>;

    /// Default model of a provider, for switches that name no model.
    fn default_model(&self, provider_id: &str) -> Option<String>;
}

impl TransportFactory for ProviderRegistry {
    fn bind(&self, model: &str, provider_id: Option<&str>) -> Result<ModelBinding> {
        let resolved = self.resolve(model, provider_id)?;
        let provider = self.build(&resolved)?;
        Ok(ModelBinding {
            provider,
            provider_id: resolved.provider.id.clone(),
            tool_result_name: resolved.requires_tool_result_name(),
            model: resolved.model,
        })
    }

    fn default_model(&self, provider_id: &str) -> Option<String> {
        self.get(provider_id).and_then(|p| p.default_model.clone())
    }
}

/// Resolve the startup binding from config: explicit provider first, then
/// detection by model name.
pub fn initial_binding(factory: &dyn TransportFactory, model: &str, provider_id: Option<&str>) -> Result<ModelBinding> {
    factory.bind(model, provider_id).map_err(|e| match e {
        Error::Config(msg) => Error::Config(format!("cannot start with model '{model}': {msg}")),
        other => other,
    })
}

//! Shared utility functions for provider adapters.

use cl_domain::config::ProviderConfig;
use cl_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve the API key for a provider.
///
/// Returns `Ok(None)` for keyless endpoints (no `api_key_env` configured,
/// e.g. a local server), and an auth error when the configured env var is
/// missing.
pub(crate) fn resolve_api_key(cfg: &ProviderConfig) -> Result<Option<String>> {
    let Some(env_var) = cfg.api_key_env.as_deref() else {
        return Ok(None);
    };
    match std::env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => Ok(Some(key)),
        _ => Err(Error::Auth(format!(
            "environment variable '{env_var}' not set (provider '{}')",
            cfg.id
        ))),
    }
}

/// Model ids that take `max_completion_tokens` and reject `temperature`.
pub(crate) fn is_reasoning_model(model: &str) -> bool {
    let model = model.to_ascii_lowercase();
    ["o1", "o3", "gpt-5"].iter().any(|p| model.starts_with(p))
}

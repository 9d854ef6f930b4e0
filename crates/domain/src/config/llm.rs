use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider system
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Active model id at startup.
    #[serde(default = "d_model")]
    pub model: String,
    /// Explicit provider id. When `None`, the provider is detected from
    /// the model name.
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default = "d_360000")]
    pub timeout_ms: u64,
    #[serde(default = "d_1536")]
    pub max_tokens: u32,
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    /// Provider entries merged over the built-in defaults by `id`
    /// (data-driven: adding a provider = adding config).
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: d_model(),
            provider: None,
            timeout_ms: 360_000,
            max_tokens: 1536,
            temperature: d_temperature(),
            providers: Vec::new(),
        }
    }
}

impl LlmConfig {
    /// Built-in providers with configured entries replacing same-id ones
    /// and new ids appended.
    pub fn effective_providers(&self) -> Vec<ProviderConfig> {
        let mut merged = builtin_providers();
        for custom in &self.providers {
            match merged.iter_mut().find(|p| p.id == custom.id) {
                Some(slot) => *slot = custom.clone(),
                None => merged.push(custom.clone()),
            }
        }
        merged
    }
}

/// One OpenAI-compatible endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub base_url: String,
    /// Env var containing the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Model-name prefixes served by this provider (used for detection).
    #[serde(default)]
    pub model_prefixes: Vec<String>,
    /// Short names mapped to official model ids.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
    /// Provider rejects tool-result messages without a `name` field.
    #[serde(default)]
    pub tool_result_name: bool,
    #[serde(default)]
    pub default_model: Option<String>,
}

impl ProviderConfig {
    fn builtin(id: &str, base_url: &str, env: &str, prefixes: &[&str], default_model: &str) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            api_key_env: Some(env.into()),
            model_prefixes: prefixes.iter().map(|p| (*p).to_owned()).collect(),
            aliases: HashMap::new(),
            tool_result_name: false,
            default_model: Some(default_model.into()),
        }
    }

    /// Whether this provider claims `model` by prefix.
    pub fn serves(&self, model: &str) -> bool {
        let model = model.to_ascii_lowercase();
        self.model_prefixes
            .iter()
            .any(|p| model.starts_with(&p.to_ascii_lowercase()))
    }

    /// Map an alias to the official model id; unknown names pass through.
    pub fn resolve_model<'a>(&'a self, model: &'a str) -> &'a str {
        self.aliases.get(model).map(String::as_str).unwrap_or(model)
    }
}

/// Default provider table. Exact values are product data, overridable in
/// `[[llm.providers]]`.
pub fn builtin_providers() -> Vec<ProviderConfig> {
    let mut claude = ProviderConfig::builtin(
        "claude",
        "https://api.anthropic.com/v1",
        "ANTHROPIC_API_KEY",
        &["claude"],
        "claude-sonnet-4-5",
    );
    claude.aliases.insert("sonnet".into(), "claude-sonnet-4-5".into());
    claude.aliases.insert("opus".into(), "claude-opus-4-1".into());

    let mut mistral = ProviderConfig::builtin(
        "mistral",
        "https://api.mistral.ai/v1",
        "MISTRAL_API_KEY",
        &["mistral", "codestral", "devstral"],
        "mistral-large-latest",
    );
    mistral.tool_result_name = true;

    vec![
        ProviderConfig::builtin(
            "grok",
            "https://api.x.ai/v1",
            "XAI_API_KEY",
            &["grok"],
            "grok-code-fast-1",
        ),
        claude,
        ProviderConfig::builtin(
            "openai",
            "https://api.openai.com/v1",
            "OPENAI_API_KEY",
            &["gpt", "o1", "o3", "o4"],
            "gpt-4o",
        ),
        ProviderConfig::builtin(
            "deepseek",
            "https://api.deepseek.com/v1",
            "DEEPSEEK_API_KEY",
            &["deepseek"],
            "deepseek-chat",
        ),
        mistral,
    ]
}

// ── serde default helpers ───────────────────────────────────────────

fn d_model() -> String {
    "grok-code-fast-1".into()
}
fn d_360000() -> u64 {
    360_000
}
fn d_1536() -> u32 {
    1536
}
fn d_temperature() -> f32 {
    0.7
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

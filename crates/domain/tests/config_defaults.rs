use cl_domain::config::{Config, ConfigSeverity};

#[test]
fn default_round_limit_is_400() {
    let config = Config::default();
    assert_eq!(config.agent.max_tool_rounds, 400);
    assert!(config.agent.persist_session);
}

#[test]
fn empty_file_equals_default() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.agent.max_tool_rounds, 400);
    assert_eq!(config.agent.summary.min_chars, 150);
    assert_eq!(config.llm.model, "grok-code-fast-1");
    assert_eq!(config.tools.bash_timeout_sec, 120);
    assert!(config.tools.confirm_mutations);
}

#[test]
fn partial_sections_keep_other_defaults() {
    let toml_str = r#"
[agent]
max_tool_rounds = 3

[agent.summary]
terse_model_prefixes = ["o3"]

[llm]
model = "mistral-large-latest"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.agent.max_tool_rounds, 3);
    assert!(config.agent.auto_restore_session);
    assert_eq!(config.agent.summary.terse_model_prefixes, vec!["o3".to_string()]);
    assert_eq!(config.agent.summary.min_chars, 150);
    assert_eq!(config.llm.model, "mistral-large-latest");
}

#[test]
fn provider_table_parses_aliases_and_quirk() {
    let toml_str = r#"
[[llm.providers]]
id = "mistral"
base_url = "https://api.mistral.ai/v1"
api_key_env = "MISTRAL_API_KEY"
model_prefixes = ["mistral"]
tool_result_name = true

[llm.providers.aliases]
large = "mistral-large-latest"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let p = &config.llm.providers[0];
    assert!(p.tool_result_name);
    assert_eq!(p.resolve_model("large"), "mistral-large-latest");
}

#[test]
fn default_config_validates_clean() {
    assert!(Config::default().validate().is_empty());
}

#[test]
fn zero_rounds_is_an_error() {
    let config: Config = toml::from_str("[agent]\nmax_tool_rounds = 0\n").unwrap();
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|e| e.severity == ConfigSeverity::Error && e.field == "agent.max_tool_rounds"));
}

#[test]
fn unknown_explicit_provider_is_an_error() {
    let config: Config = toml::from_str("[llm]\nprovider = \"nope\"\n").unwrap();
    let issues = config.validate();
    assert!(issues.iter().any(|e| e.field == "llm.provider"));
}

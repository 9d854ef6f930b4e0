use cl_domain::config::{LlmConfig, ProviderConfig};
use cl_domain::error::Error;
use cl_providers::ProviderRegistry;

fn local_provider() -> ProviderConfig {
    ProviderConfig {
        id: "local".into(),
        base_url: "http://127.0.0.1:11434/v1/".into(),
        api_key_env: None,
        model_prefixes: vec!["qwen".into()],
        aliases: [("coder".to_string(), "qwen2.5-coder:14b".to_string())]
            .into_iter()
            .collect(),
        tool_result_name: false,
        default_model: None,
    }
}

#[test]
fn keyless_custom_provider_builds() {
    let config = LlmConfig {
        model: "coder".into(),
        providers: vec![local_provider()],
        ..Default::default()
    };
    let registry = ProviderRegistry::from_config(&config);

    let resolved = registry.resolve(&config.model, None).unwrap();
    assert_eq!(resolved.model, "qwen2.5-coder:14b");

    let provider = registry.build(&resolved).unwrap();
    assert_eq!(provider.provider_id(), "local");
}

#[test]
fn missing_api_key_fails_at_build() {
    let mut cfg = local_provider();
    cfg.api_key_env = Some("CL_TEST_REGISTRY_MISSING_KEY_4242".into());
    let config = LlmConfig {
        providers: vec![cfg],
        ..Default::default()
    };
    let registry = ProviderRegistry::from_config(&config);
    let resolved = registry.resolve("qwen3", Some("local")).unwrap();

    match registry.build(&resolved) {
        Err(Error::Auth(msg)) => assert!(msg.contains("CL_TEST_REGISTRY_MISSING_KEY_4242")),
        Err(other) => panic!("expected auth error, got {other}"),
        Ok(_) => panic!("expected auth error"),
    }
}

#[test]
fn provider_list_includes_builtins_and_custom() {
    let config = LlmConfig {
        providers: vec![local_provider()],
        ..Default::default()
    };
    let ids = ProviderRegistry::from_config(&config).list_providers();
    assert_eq!(ids, vec!["claude", "deepseek", "grok", "local", "mistral", "openai"]);
}

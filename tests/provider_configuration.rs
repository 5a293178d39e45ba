use conversql::{GenerationOrchestrator, ProviderRegistry, ProviderSelection, Settings};
use std::collections::HashMap;

fn settings(pairs: &[(&str, &str)]) -> Settings {
    let env: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Settings::from_lookup(|name| env.get(name).cloned())
}

fn available(registry: &ProviderRegistry) -> Vec<&str> {
    registry
        .iter()
        .filter(|a| a.is_available())
        .map(|a| a.identifier())
        .collect()
}

#[tokio::test]
async fn api_keys_decide_availability() {
    let registry = ProviderRegistry::from_settings(&settings(&[
        ("CLAUDE_API_KEY", "sk-ant-test"),
        ("GEMINI_API_KEY", "g-test"),
    ]))
    .await;
    assert_eq!(available(&registry), vec!["claude", "gemini"]);
}

#[tokio::test]
async fn bedrock_accepts_bearer_token_or_static_keys() {
    let bearer = ProviderRegistry::from_settings(&settings(&[("AWS_BEARER_TOKEN_BEDROCK", "t")])).await;
    assert_eq!(available(&bearer), vec!["bedrock"]);

    let keys = ProviderRegistry::from_settings(&settings(&[
        ("AWS_ACCESS_KEY_ID", "AKID"),
        ("AWS_SECRET_ACCESS_KEY", "secret"),
    ]))
    .await;
    assert_eq!(available(&keys), vec!["bedrock"]);

    let disabled = ProviderRegistry::from_settings(&settings(&[
        ("AWS_BEARER_TOKEN_BEDROCK", "t"),
        ("ENABLE_BEDROCK", "false"),
    ]))
    .await;
    assert!(available(&disabled).is_empty());
}

#[tokio::test]
async fn bedrock_picks_up_a_named_aws_profile() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials");
    std::fs::write(&path, "[loans]\naws_access_key_id = AKID\naws_secret_access_key = secret\n").unwrap();
    let path = path.to_str().unwrap();

    let registry = ProviderRegistry::from_settings(&settings(&[
        ("AWS_SHARED_CREDENTIALS_FILE", path),
        ("AWS_PROFILE", "loans"),
    ]))
    .await;
    assert_eq!(available(&registry), vec!["bedrock"]);

    let other_profile = ProviderRegistry::from_settings(&settings(&[("AWS_SHARED_CREDENTIALS_FILE", path)])).await;
    assert!(available(&other_profile).is_empty());
}

#[tokio::test]
async fn preferred_provider_from_environment() {
    let orchestrator = GenerationOrchestrator::from_settings(&settings(&[
        ("CLAUDE_API_KEY", "sk-ant-test"),
        ("OPENAI_API_KEY", "sk-test"),
        ("AI_PROVIDER", "OpenAI"),
    ]))
    .await
    .unwrap();
    assert_eq!(orchestrator.state(), ProviderSelection::Selected("openai".to_string()));
    assert_eq!(orchestrator.active_provider(), Some("openai"));
}

#[tokio::test]
async fn unknown_preference_falls_back_to_first_available() {
    let orchestrator = GenerationOrchestrator::from_settings(&settings(&[
        ("OPENAI_API_KEY", "sk-test"),
        ("AI_PROVIDER", "watson"),
    ]))
    .await
    .unwrap();
    assert_eq!(orchestrator.active_provider(), Some("openai"));
}

#[tokio::test]
async fn nothing_configured_means_no_provider() {
    let orchestrator = GenerationOrchestrator::from_settings(&Settings::empty()).await.unwrap();
    assert_eq!(orchestrator.state(), ProviderSelection::NoProviderAvailable);
    let status = orchestrator.provider_status();
    assert_eq!(status.len(), 5);
    assert!(status.iter().all(|s| !s.available && !s.active));
}

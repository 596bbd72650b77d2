use super::data::Config;
use super::io::ConfigError;
use crate::api::LlmProvider;
use crate::render::CodeBlockStyle;
use std::time::Duration;
use tempfile::TempDir;

fn provider(model: &str) -> LlmProvider {
    LlmProvider {
        model: model.to_string(),
        provider: "ollama".to_string(),
        title: format!("ollama - {model}"),
        icon: String::new(),
        subtitle: String::new(),
        system_message: String::new(),
        api_key_name: String::new(),
        api_base: Some("http://localhost:11434/v1".to_string()),
        local: Some(true),
    }
}

#[test]
fn test_load_nonexistent_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nonexistent_config.toml");

    let config = Config::load_from_path(&config_path).expect("Failed to load config");

    assert_eq!(config, Config::default());
    assert_eq!(config.server_url(), "http://localhost:8000/chat/");
}

#[test]
fn test_config_persistence_lifecycle() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nested").join("config.toml");

    let mut config = Config {
        default_model: Some("gpt-4o-mini".to_string()),
        cursor: Some(false),
        code_style: Some("component".to_string()),
        scroll_throttle_ms: Some(50),
        ..Default::default()
    };
    config.add_custom_provider(provider("qwen2.5-coder"));
    config
        .save_to_path(&config_path)
        .expect("Failed to save config");

    let loaded = Config::load_from_path(&config_path).expect("Failed to load config");
    assert_eq!(loaded, config);

    let mut loaded = loaded;
    assert!(loaded.remove_custom_provider("QWEN2.5-CODER"));
    assert!(!loaded.remove_custom_provider("missing"));
    loaded.default_model = None;
    loaded.save_to_path(&config_path).expect("Failed to resave");

    let reloaded = Config::load_from_path(&config_path).expect("Failed to reload");
    assert!(reloaded.custom_providers.is_empty());
    assert_eq!(reloaded.default_model, None);
    // No temp files left behind.
    let entries = std::fs::read_dir(temp_dir.path().join("nested"))
        .expect("dir exists")
        .count();
    assert_eq!(entries, 1);
}

#[test]
fn derived_options_follow_settings() {
    let config = Config {
        cursor: Some(false),
        code_style: Some("Component".to_string()),
        blink_interval_ms: Some(500),
        scroll_throttle_ms: Some(0),
        engine_max_attempts: Some(5),
        ..Default::default()
    };
    let renderer = config.renderer_options();
    assert!(!renderer.cursor);
    assert_eq!(renderer.code_style, CodeBlockStyle::Component);
    assert_eq!(renderer.blink_interval, Duration::from_millis(500));
    assert_eq!(config.driver_options().scroll_throttle, Duration::ZERO);
    assert_eq!(config.retry_policy().max_attempts, 5);

    let defaults = Config::default();
    assert!(defaults.renderer_options().cursor);
    assert_eq!(defaults.code_block_style(), CodeBlockStyle::Inline);
    assert_eq!(defaults.retry_policy().max_attempts, 3);
}

#[test]
fn unknown_code_style_falls_back_to_inline() {
    let config = Config {
        code_style: Some("fancy".to_string()),
        ..Default::default()
    };
    assert_eq!(config.code_block_style(), CodeBlockStyle::Inline);
}

#[test]
fn custom_providers_accept_snake_case_keys() {
    let toml = r#"
server_url = "http://127.0.0.1:9000/chat/"

[[custom_providers]]
provider = "ollama"
model = "llama3.2"
api_base = "http://localhost:11434/v1"
local = true
"#;
    let config: Config = toml::from_str(toml).expect("valid config");
    assert_eq!(config.server_url(), "http://127.0.0.1:9000/chat/");
    let custom = config.get_custom_provider("llama3.2").expect("provider");
    assert_eq!(custom.api_base.as_deref(), Some("http://localhost:11434/v1"));
    assert!(custom.is_local());
}

#[test]
fn invalid_toml_reports_parse_error_with_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "cursor = [").expect("write");

    let err = Config::load_from_path(&config_path).expect_err("invalid toml");
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().starts_with("Failed to parse config at "));
    assert!(std::error::Error::source(&err).is_some());
}

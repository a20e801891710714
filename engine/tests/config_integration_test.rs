//! Integration tests for configuration management
//!
//! These tests load real files through the public API and check
//! validation, defaults and workspace canonicalization.

use mind2code_engine::config::Config;
use sdk::errors::EngineError;
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_load_full_config_file() {
    let dir = TempDir::new().unwrap();
    let workspace = dir.path().join("ws");
    let path = write_config(
        &dir,
        &format!(
            r#"
[core]
workspace = "{}"
output_root = "generated/code"
log_level = "debug"

[llm]
default_provider = "openai"
timeout_secs = 60

[llm.ollama]
base_url = "http://127.0.0.1:11434"
model = "qwen2.5-coder:7b"

[llm.openai]
base_url = "https://example.test/v1"
model = "gpt-4o"
api_key_env = "MY_KEY"

[orchestrator]
confidence_threshold = 0.8
max_steps = 12
window_size = 10
"#,
            workspace.display()
        ),
    );

    let config = Config::load_from_path(&path).unwrap();

    assert_eq!(config.core.log_level, "debug");
    assert_eq!(config.core.output_root, std::path::PathBuf::from("generated/code"));
    assert_eq!(config.llm.default_provider, "openai");
    assert_eq!(config.llm.timeout_secs, 60);
    assert_eq!(config.llm.ollama.model, "qwen2.5-coder:7b");
    assert_eq!(config.llm.openai.api_key_env, "MY_KEY");
    assert_eq!(config.orchestrator.confidence_threshold, 0.8);
    assert_eq!(config.orchestrator.max_steps, 12);
    assert_eq!(config.orchestrator.window_size, 10);

    // The workspace is created and canonicalized
    assert!(workspace.is_dir());
    assert_eq!(config.core.workspace, workspace.canonicalize().unwrap());
}

#[test]
fn test_minimal_config_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        &format!(
            r#"
[core]
workspace = "{}"

[llm]
default_provider = "ollama"
"#,
            dir.path().display()
        ),
    );

    let config = Config::load_from_path(&path).unwrap();
    assert_eq!(config.core.log_level, "info");
    assert_eq!(config.core.output_root, std::path::PathBuf::from("out"));
    assert_eq!(config.llm.timeout_secs, 300);
    assert_eq!(config.llm.ollama.base_url, "http://localhost:11434");
    assert_eq!(config.llm.openai.api_key_env, "OPENAI_API_KEY");
    assert_eq!(config.orchestrator.confidence_threshold, 0.7);
    assert_eq!(config.orchestrator.max_steps, 24);
    assert_eq!(config.orchestrator.window_size, 20);
}

#[test]
fn test_invalid_values_are_config_errors() {
    let dir = TempDir::new().unwrap();
    let cases = [
        ("default_provider = \"anthropic\"", "", "provider"),
        ("default_provider = \"ollama\"\ntimeout_secs = 0", "", "timeout"),
        (
            "default_provider = \"ollama\"",
            "[orchestrator]\nmax_steps = 0",
            "max_steps",
        ),
        (
            "default_provider = \"ollama\"",
            "[orchestrator]\nwindow_size = 1",
            "window_size",
        ),
    ];

    for (llm, extra, needle) in cases {
        let path = write_config(
            &dir,
            &format!(
                "[core]\nworkspace = \"{}\"\n\n[llm]\n{}\n\n{}\n",
                dir.path().display(),
                llm,
                extra
            ),
        );
        match Config::load_from_path(&path) {
            Err(EngineError::Config(msg)) => assert!(
                msg.contains(needle),
                "expected '{}' in error, got: {}",
                needle,
                msg
            ),
            other => panic!("expected a config error for '{}', got {:?}", needle, other.map(|_| ())),
        }
    }
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let result = Config::load_from_path(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(EngineError::Config(_))));
}

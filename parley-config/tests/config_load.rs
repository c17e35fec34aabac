use parley_config::{LoadError, ParleyConfigLoader};
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

const FILE_YAML: &str = r#"
assistant:
  api_key: "${PARLEY_TEST_OPENAI_KEY}"
  model: "gpt-4o-mini"
  assistant_id: "asst_file"
  file_ids: ["file-1", "file-2"]
run:
  poll_interval_ms: 500
  timeout_secs: 120
  poll_retry:
    max_attempts: 5
proxy:
  api_key: "${PARLEY_TEST_PROXY_KEY}"
  timeout_secs: 10
logging:
  format: json
  emit_stderr: true
"#;

#[test]
#[serial]
fn loads_file_and_expands_secrets() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "parley.yaml", FILE_YAML);

    temp_env::with_vars(
        [
            ("PARLEY_TEST_OPENAI_KEY", Some("sk-from-env")),
            ("PARLEY_TEST_PROXY_KEY", Some("px-from-env")),
        ],
        || {
            let cfg = ParleyConfigLoader::new()
                .with_file(&p)
                .load()
                .expect("load parley config");

            assert_eq!(cfg.assistant.api_key, "sk-from-env");
            assert_eq!(cfg.proxy.api_key, "px-from-env");
            assert_eq!(cfg.assistant.assistant_id.as_deref(), Some("asst_file"));
            assert_eq!(cfg.assistant.file_ids, vec!["file-1", "file-2"]);
            assert_eq!(cfg.run.poll_interval_ms, 500);
            assert_eq!(cfg.run.timeout_secs, 120);
            assert_eq!(cfg.run.poll_retry.max_attempts, 5);
            assert_eq!(cfg.run.poll_retry.base_delay_ms, 500);
            assert_eq!(cfg.proxy.timeout_secs, 10);
            assert_eq!(cfg.logging.format, "json");
            assert!(cfg.logging.emit_stderr);
        },
    );
}

#[test]
#[serial]
fn environment_overrides_file_values() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "parley.yaml", FILE_YAML);

    temp_env::with_vars(
        [
            ("PARLEY_TEST_OPENAI_KEY", Some("sk-from-env")),
            ("PARLEY_TEST_PROXY_KEY", Some("px-from-env")),
            ("PARLEY__RUN__TIMEOUT_SECS", Some("45")),
            ("PARLEY__ASSISTANT__MODEL", Some("gpt-4.1")),
        ],
        || {
            let cfg = ParleyConfigLoader::new().with_file(&p).load().unwrap();
            assert_eq!(cfg.run.timeout_secs, 45);
            assert_eq!(cfg.assistant.model, "gpt-4.1");
        },
    );
}

#[test]
#[serial]
fn optional_file_may_be_missing() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("absent.yaml");

    let cfg = ParleyConfigLoader::new()
        .with_optional_file(&missing)
        .with_yaml_str("assistant:\n  api_key: sk\nproxy:\n  api_key: px\n")
        .load()
        .expect("missing optional file is fine");
    assert_eq!(cfg.assistant.api_key, "sk");
}

#[test]
#[serial]
fn required_file_must_exist() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("absent.yaml");

    let err = ParleyConfigLoader::new().with_file(&missing).load().unwrap_err();
    assert!(matches!(err, LoadError::Source(_)));
}

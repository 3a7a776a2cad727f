use plume_config::{PlumeConfigLoader, ProviderDetails};
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

#[test]
#[serial]
fn test_config_load() {
    let tmp = TempDir::new().unwrap();

    let file_yaml = r#"
version: "0.1"
provider:
  id: main
  kind: api
  enabled: true
  config:
    bearer_token: "${PROVIDER_BEARER_TOKEN}"
ingest:
  daily_budget: 50
  staleness_hours: 12
database:
  url: "sqlite::memory:"
trigger:
  secret: "${TRIGGER_SECRET}"
"#;
    let p = write_yaml(&tmp, "plume.yaml", file_yaml);

    let config = temp_env::with_vars(
        [
            ("PROVIDER_BEARER_TOKEN", Some("bearer-from-env")),
            ("TRIGGER_SECRET", Some("sesame")),
        ],
        || {
            PlumeConfigLoader::new()
                .with_file(&p)
                .load()
                .expect("load plume config")
        },
    );

    assert_eq!(config.version.as_deref(), Some("0.1"));
    assert_eq!(config.ingest.daily_budget, 50);
    assert_eq!(config.ingest.staleness_hours, 12);
    // Unset fields fall back to policy defaults.
    assert_eq!(config.ingest.retention_days, 7);
    assert_eq!(config.trigger.secret, "sesame");
    match &config.provider.details {
        ProviderDetails::Api { config } => {
            assert_eq!(config.bearer_token, "bearer-from-env");
        }
        other => panic!("expected api provider, got {other:?}"),
    }
}

#[test]
#[serial]
fn test_minimal_config_uses_defaults() {
    let config = PlumeConfigLoader::new()
        .with_yaml_str(
            r#"
provider:
  id: main
  kind: syndication
  config: {}
trigger:
  secret: sesame
"#,
        )
        .load()
        .expect("load minimal config");

    assert_eq!(config.ingest.daily_budget, 200);
    assert_eq!(config.ingest.pacing_ms, 1_000);
    assert_eq!(config.database.url, "sqlite://plume.db");
    match &config.provider.details {
        ProviderDetails::Syndication { config } => {
            assert_eq!(config.endpoint, "https://cdn.syndication.twimg.com");
        }
        other => panic!("expected syndication provider, got {other:?}"),
    }
}

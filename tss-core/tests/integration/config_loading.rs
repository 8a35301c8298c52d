use std::time::Duration;
use tss_core::domain::Operation;
use tss_core::infrastructure::config::{load_config_from_file, load_config_from_str};
use tss_core::TssError;

const OVERRIDES: &str = r#"
[party]
join_party_timeout_secs = 12
leader_salt = "ring-7"

[session]
regroup_timeout_secs = 90

[storage]
base_dir = "/var/lib/tss"
"#;

#[test]
fn test_config_when_file_overrides_sections_then_merged_with_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("tss.toml");
    std::fs::write(&path, OVERRIDES).expect("write config");

    let config = load_config_from_file(&path).expect("load");
    assert_eq!(config.party.join_party_timeout(), Duration::from_secs(12));
    assert_eq!(config.party.leader_salt, "ring-7");
    assert_eq!(config.session.timeout_for(Operation::Regroup), Duration::from_secs(90));
    assert_eq!(config.session.timeout_for(Operation::Keysign), Duration::from_secs(tss_core::foundation::KEYSIGN_TIMEOUT_SECS));
    assert_eq!(config.storage.base_dir, "/var/lib/tss");
}

#[test]
fn test_config_when_retry_interval_exceeds_timeout_then_config_error() {
    let toml = "[party]\njoin_party_timeout_secs = 1\njoin_party_retry_interval_ms = 5000\n";
    let err = load_config_from_str(toml).expect_err("invalid");
    assert!(matches!(err, TssError::ConfigError(message) if message.contains("join_party_retry_interval_ms")));
}

#[test]
fn test_config_when_value_has_wrong_type_then_config_error() {
    let err = load_config_from_str("[transport]\npublish_retries = \"many\"\n").expect_err("wrong type");
    assert!(matches!(err, TssError::ConfigError(_)));
}

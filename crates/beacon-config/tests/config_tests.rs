// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Beacon configuration system.

use beacon_config::diagnostic::ConfigError;
use beacon_config::{load_and_validate_str, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r##"
[engine]
name = "ops-floor"
log_level = "debug"
max_in_flight = 4

[storage]
database_path = "/tmp/beacon.db"
wal_mode = false

[classifier]
endpoint = "http://localhost:9000/analyze"
timeout_ms = 1500

[matcher]
default_threshold = 0.4

[detector]
enabled = false
min_cluster_size = 4

[escalation.bands]
medium = 0.25
high = 0.5
critical = 0.9

[dispatch]
max_attempts = 2
rate_per_minute = 60

[transport]
endpoint = "http://localhost:3000"

[gateway]
port = 8088
bearer_token = "secret"

[[categories]]
name = "Equipment"
department = "facilities"
color = "#f97316"
keywords = ["broken", "treadmill", "machine"]
severity_bias = 0.7

[[destinations]]
id = "120363-facilities@g.us"
name = "Facilities"
"##;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.engine.name, "ops-floor");
    assert_eq!(config.engine.max_in_flight, 4);
    assert_eq!(config.engine.queue_capacity, 1024);
    assert!(!config.storage.wal_mode);
    assert_eq!(config.classifier.timeout_ms, 1500);
    assert_eq!(config.matcher.default_threshold, 0.4);
    assert_eq!(config.matcher.keyword_weight, 0.6);
    assert!(!config.detector.enabled);
    assert_eq!(config.detector.min_cluster_size, 4);
    assert_eq!(config.escalation.bands.critical, 0.9);
    assert_eq!(config.escalation.repetition_weight, 0.35);
    assert_eq!(config.dispatch.max_attempts, 2);
    assert_eq!(config.dispatch.burst, 5);
    assert_eq!(config.gateway.port, 8088);
    assert_eq!(config.categories.len(), 1);
    assert_eq!(config.categories[0].keywords.len(), 3);
    assert_eq!(config.categories[0].threshold, None);
    assert_eq!(config.destinations[0].id, "120363-facilities@g.us");
    assert!(config.destinations[0].active);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty config is valid");
    assert_eq!(config.engine.name, "beacon");
    assert_eq!(config.dispatch.max_attempts, 4);
    assert_eq!(config.dispatch.base_backoff_ms, 500);
    assert_eq!(config.detector.interval_secs, 900);
    assert_eq!(config.escalation.bands.medium, 0.3);
    assert!(config.categories.is_empty());
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = "[dispatch]\nmax_atempts = 3\n";
    let errors = load_and_validate_str(toml).expect_err("unknown key");
    let suggestion = errors.iter().find_map(|e| match e {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => Some((key.clone(), suggestion.clone())),
        _ => None,
    });
    assert_eq!(
        suggestion,
        Some(("max_atempts".to_string(), Some("max_attempts".to_string())))
    );
}

#[test]
fn unknown_top_level_section_rejected() {
    let errors = load_and_validate_str("[telegram]\nbot_token = \"x\"\n").expect_err("unknown");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::UnknownKey { key, .. } if key == "telegram")));
}

#[test]
fn wrong_type_reported() {
    let errors = load_and_validate_str("[gateway]\nport = \"eighty\"\n").expect_err("bad type");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::InvalidType { .. })));
}

#[test]
fn static_category_requires_name() {
    let errors =
        load_and_validate_str("[[categories]]\nkeywords = [\"x\"]\n").expect_err("missing name");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::MissingKey { key } if key.ends_with("name"))));
}

#[test]
fn duplicate_destinations_rejected() {
    let toml = r#"
[[destinations]]
id = "group-a"

[[destinations]]
id = "group-a"
"#;
    let errors = load_and_validate_str(toml).expect_err("duplicate");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::Validation { key, .. } if key == "destinations[1].id"
    )));
}

#[test]
fn out_of_range_category_threshold_rejected() {
    let toml = "[[categories]]\nname = \"Cleaning\"\nthreshold = 1.2\n";
    let errors = load_and_validate_str(toml).expect_err("threshold");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::Validation { key, .. } if key == "categories[0].threshold"
    )));
}

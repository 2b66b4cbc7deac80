// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks serde attributes cannot express.
//!
//! All failures are collected; validation never stops at the first one.

use std::collections::HashSet;

use beacon_core::SeverityBands;

use crate::diagnostic::ConfigError;
use crate::model::BeaconConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
pub fn validate_config(config: &BeaconConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut check = |ok: bool, key: &str, message: String| {
        if !ok {
            errors.push(ConfigError::validation(key, message));
        }
    };

    let engine = &config.engine;
    check(
        !engine.name.trim().is_empty(),
        "engine.name",
        "must not be empty".into(),
    );
    check(
        LOG_LEVELS.contains(&engine.log_level.as_str()),
        "engine.log_level",
        format!("`{}` is not one of {}", engine.log_level, LOG_LEVELS.join(", ")),
    );
    check(
        engine.max_in_flight >= 1,
        "engine.max_in_flight",
        "must be at least 1".into(),
    );
    check(
        engine.queue_capacity >= 1,
        "engine.queue_capacity",
        "must be at least 1".into(),
    );

    check(
        !config.storage.database_path.trim().is_empty(),
        "storage.database_path",
        "must not be empty".into(),
    );

    check(
        config.classifier.timeout_ms > 0,
        "classifier.timeout_ms",
        "must be greater than 0".into(),
    );
    if let Some(endpoint) = &config.classifier.endpoint {
        check(
            is_http_url(endpoint),
            "classifier.endpoint",
            format!("`{endpoint}` is not an http(s) URL"),
        );
    }

    let matcher = &config.matcher;
    check(
        unit(matcher.default_threshold),
        "matcher.default_threshold",
        format!("must be within 0.0-1.0, got {}", matcher.default_threshold),
    );
    let weights = [
        ("matcher.keyword_weight", matcher.keyword_weight),
        ("matcher.entity_weight", matcher.entity_weight),
        ("matcher.intent_weight", matcher.intent_weight),
    ];
    for (key, w) in weights {
        check(w >= 0.0, key, format!("must be non-negative, got {w}"));
    }
    check(
        weights.iter().map(|(_, w)| w).sum::<f64>() > 0.0,
        "matcher",
        "at least one weight must be positive".into(),
    );
    check(
        matcher.keyword_saturation >= 1,
        "matcher.keyword_saturation",
        "must be at least 1".into(),
    );

    let detector = &config.detector;
    check(
        detector.interval_secs > 0,
        "detector.interval_secs",
        "must be greater than 0".into(),
    );
    check(
        unit(detector.similarity_threshold),
        "detector.similarity_threshold",
        format!("must be within 0.0-1.0, got {}", detector.similarity_threshold),
    );
    check(
        unit(detector.overlap_threshold),
        "detector.overlap_threshold",
        format!("must be within 0.0-1.0, got {}", detector.overlap_threshold),
    );
    check(
        detector.min_cluster_size >= 2,
        "detector.min_cluster_size",
        "must be at least 2".into(),
    );
    check(
        detector.max_samples >= 1,
        "detector.max_samples",
        "must be at least 1".into(),
    );
    check(
        detector.max_keywords >= 1,
        "detector.max_keywords",
        "must be at least 1".into(),
    );
    check(
        detector.window_secs > 0,
        "detector.window_secs",
        "must be greater than 0".into(),
    );
    check(
        detector.max_pool_size >= detector.min_cluster_size,
        "detector.max_pool_size",
        "must be at least detector.min_cluster_size".into(),
    );

    let escalation = &config.escalation;
    let weights = [
        ("escalation.repetition_weight", escalation.repetition_weight),
        ("escalation.sentiment_weight", escalation.sentiment_weight),
        ("escalation.category_weight", escalation.category_weight),
        ("escalation.flag_weight", escalation.flag_weight),
    ];
    for (key, w) in weights {
        check(w >= 0.0, key, format!("must be non-negative, got {w}"));
    }
    check(
        escalation.repetition_saturation >= 1,
        "escalation.repetition_saturation",
        "must be at least 1".into(),
    );
    check(
        unit(escalation.near_duplicate_similarity),
        "escalation.near_duplicate_similarity",
        "must be within 0.0-1.0".into(),
    );
    if let Err(e) = SeverityBands::from(&escalation.bands).validate() {
        check(false, "escalation.bands", e.to_string());
    }

    let dispatch = &config.dispatch;
    check(
        dispatch.max_attempts >= 1,
        "dispatch.max_attempts",
        "must be at least 1".into(),
    );
    check(
        dispatch.base_backoff_ms <= dispatch.max_backoff_ms,
        "dispatch.base_backoff_ms",
        "must not exceed dispatch.max_backoff_ms".into(),
    );
    check(
        dispatch.send_timeout_ms > 0,
        "dispatch.send_timeout_ms",
        "must be greater than 0".into(),
    );
    check(
        dispatch.audit_timeout_ms > 0,
        "dispatch.audit_timeout_ms",
        "must be greater than 0".into(),
    );
    check(
        dispatch.rate_per_minute >= 1,
        "dispatch.rate_per_minute",
        "must be at least 1".into(),
    );
    check(dispatch.burst >= 1, "dispatch.burst", "must be at least 1".into());

    if let Some(endpoint) = &config.transport.endpoint {
        check(
            is_http_url(endpoint),
            "transport.endpoint",
            format!("`{endpoint}` is not an http(s) URL"),
        );
    }

    let gateway = &config.gateway;
    if gateway.enabled {
        let host = gateway.host.trim();
        let valid_host = host.parse::<std::net::IpAddr>().is_ok()
            || (!host.is_empty()
                && host
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '.' || c == '-'));
        check(
            valid_host,
            "gateway.host",
            format!("`{host}` is not a valid IP address or hostname"),
        );
        if let Some(token) = &gateway.bearer_token {
            check(
                !token.trim().is_empty(),
                "gateway.bearer_token",
                "must not be blank when set".into(),
            );
        }
    }

    let mut names = HashSet::new();
    for (i, category) in config.categories.iter().enumerate() {
        let name = category.name.trim();
        check(
            !name.is_empty(),
            &format!("categories[{i}].name"),
            "must not be empty".into(),
        );
        check(
            name.is_empty() || names.insert(name.to_lowercase()),
            &format!("categories[{i}].name"),
            format!("duplicate category `{name}`"),
        );
        check(
            unit(category.severity_bias),
            &format!("categories[{i}].severity_bias"),
            format!("must be within 0.0-1.0, got {}", category.severity_bias),
        );
        if let Some(t) = category.threshold {
            check(
                unit(t),
                &format!("categories[{i}].threshold"),
                format!("must be within 0.0-1.0, got {t}"),
            );
        }
    }

    let mut ids = HashSet::new();
    for (i, destination) in config.destinations.iter().enumerate() {
        let id = destination.id.trim();
        check(
            !id.is_empty(),
            &format!("destinations[{i}].id"),
            "must not be empty".into(),
        );
        check(
            id.is_empty() || ids.insert(id.to_string()),
            &format!("destinations[{i}].id"),
            format!("duplicate destination `{id}`"),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn unit(v: f64) -> bool {
    (0.0..=1.0).contains(&v)
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(errors: &[ConfigError]) -> Vec<String> {
        errors
            .iter()
            .filter_map(|e| match e {
                ConfigError::Validation { key, .. } => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&BeaconConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_failure() {
        let mut config = BeaconConfig::default();
        config.storage.database_path = " ".into();
        config.dispatch.max_attempts = 0;
        config.matcher.default_threshold = 1.5;
        let errors = validate_config(&config).unwrap_err();
        let keys = keys(&errors);
        assert!(keys.contains(&"storage.database_path".to_string()));
        assert!(keys.contains(&"dispatch.max_attempts".to_string()));
        assert!(keys.contains(&"matcher.default_threshold".to_string()));
    }

    #[test]
    fn unordered_bands_rejected() {
        let mut config = BeaconConfig::default();
        config.escalation.bands.high = 0.2;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(keys(&errors), vec!["escalation.bands".to_string()]);
    }

    #[test]
    fn zero_matcher_weights_rejected() {
        let mut config = BeaconConfig::default();
        config.matcher.keyword_weight = 0.0;
        config.matcher.entity_weight = 0.0;
        config.matcher.intent_weight = 0.0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(keys(&errors), vec!["matcher".to_string()]);
    }

    #[test]
    fn bad_log_level_rejected() {
        let mut config = BeaconConfig::default();
        config.engine.log_level = "loud".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(keys(&errors), vec!["engine.log_level".to_string()]);
    }

    #[test]
    fn seeded_entries_deserialize_with_defaults() {
        let toml_str = r##"
[[categories]]
name = "Equipment"
keywords = ["treadmill", "broken"]

[[categories]]
name = "Cleanliness"
department = "housekeeping"
color = "#22c55e"
keywords = ["dirty"]
severity_bias = 0.3
threshold = 0.5

[[destinations]]
id = "maintenance-alerts"
name = "Maintenance"

[[destinations]]
id = "front-desk"
active = false
"##;
        let config: BeaconConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.categories.len(), 2);
        assert_eq!(config.categories[0].department, "general");
        assert_eq!(config.categories[0].severity_bias, 0.5);
        assert_eq!(config.categories[0].threshold, None);
        assert_eq!(config.categories[1].threshold, Some(0.5));
        assert!(config.destinations[0].active);
        assert!(!config.destinations[1].active);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn seeded_categories_deny_unknown_fields() {
        let toml_str = r#"
[[categories]]
name = "Equipment"
priority = 3
"#;
        assert!(toml::from_str::<BeaconConfig>(toml_str).is_err());
    }

    #[test]
    fn out_of_range_category_threshold_rejected() {
        let toml_str = r#"
[[categories]]
name = "Equipment"
threshold = 1.4
"#;
        let config: BeaconConfig = toml::from_str(toml_str).unwrap();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(keys(&errors), vec!["categories[0].threshold".to_string()]);
    }
}

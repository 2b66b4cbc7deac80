// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Beacon routing engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use beacon_core::SeverityBands;
use serde::{Deserialize, Serialize};

/// Top-level Beacon configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BeaconConfig {
    /// Process identity and pipeline concurrency.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// External analysis call settings.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Category matching weights and default threshold.
    #[serde(default)]
    pub matcher: MatcherConfig,

    /// Dynamic category detection settings.
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Escalation scoring weights and severity bands.
    #[serde(default)]
    pub escalation: EscalationConfig,

    /// Delivery retry, timeout, and rate limit settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Chat transport bridge settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Static categories seeded as approved on startup.
    #[serde(default)]
    pub categories: Vec<StaticCategoryConfig>,

    /// Destination groups seeded on startup.
    #[serde(default)]
    pub destinations: Vec<DestinationConfig>,
}

/// Process identity and pipeline concurrency.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Display name used in logs and the health endpoint.
    #[serde(default = "default_engine_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Maximum number of messages processed concurrently.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Capacity of the ingestion queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: default_engine_name(),
            log_level: default_log_level(),
            max_in_flight: default_max_in_flight(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_engine_name() -> String {
    "beacon".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_in_flight() -> usize {
    16
}

fn default_queue_capacity() -> usize {
    1024
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("beacon").join("beacon.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("beacon.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// External analysis call configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Analysis endpoint URL. `None` uses the built-in lexicon analyzer.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer token sent to the analysis endpoint.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Upper bound on one analysis call, in milliseconds.
    #[serde(default = "default_classifier_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_token: None,
            timeout_ms: default_classifier_timeout_ms(),
        }
    }
}

fn default_classifier_timeout_ms() -> u64 {
    3000
}

/// Category matching configuration.
///
/// The match score is a normalized weighted sum of keyword overlap,
/// entity affinity, and intent affinity, scaled by classifier confidence.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MatcherConfig {
    /// Threshold (0.0-1.0) given to categories that do not set their own.
    #[serde(default = "default_match_threshold")]
    pub default_threshold: f64,

    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,

    #[serde(default = "default_entity_weight")]
    pub entity_weight: f64,

    #[serde(default = "default_intent_weight")]
    pub intent_weight: f64,

    /// Keyword hits at which the keyword signal saturates at 1.0.
    #[serde(default = "default_keyword_saturation")]
    pub keyword_saturation: u32,

    /// Seconds before the cached approved-category snapshot is reloaded.
    #[serde(default = "default_snapshot_ttl_secs")]
    pub snapshot_ttl_secs: u64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            default_threshold: default_match_threshold(),
            keyword_weight: default_keyword_weight(),
            entity_weight: default_entity_weight(),
            intent_weight: default_intent_weight(),
            keyword_saturation: default_keyword_saturation(),
            snapshot_ttl_secs: default_snapshot_ttl_secs(),
        }
    }
}

fn default_match_threshold() -> f64 {
    0.35
}

fn default_keyword_weight() -> f64 {
    0.6
}

fn default_entity_weight() -> f64 {
    0.2
}

fn default_intent_weight() -> f64 {
    0.2
}

fn default_keyword_saturation() -> u32 {
    2
}

fn default_snapshot_ttl_secs() -> u64 {
    30
}

/// Dynamic category detection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DetectorConfig {
    /// Run the periodic detector. On-demand runs work either way.
    #[serde(default = "default_detector_enabled")]
    pub enabled: bool,

    /// Seconds between detection runs.
    #[serde(default = "default_detector_interval_secs")]
    pub interval_secs: u64,

    /// Minimum token Jaccard similarity for a message to join a cluster.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Smallest cluster that becomes a candidate.
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,

    /// Representative messages kept per category.
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,

    /// Keywords kept per candidate.
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,

    /// Keyword overlap at which a cluster is folded into an existing category.
    #[serde(default = "default_overlap_threshold")]
    pub overlap_threshold: f64,

    /// Length of the trend window in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Upper bound on retained unmatched messages.
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            enabled: default_detector_enabled(),
            interval_secs: default_detector_interval_secs(),
            similarity_threshold: default_similarity_threshold(),
            min_cluster_size: default_min_cluster_size(),
            max_samples: default_max_samples(),
            max_keywords: default_max_keywords(),
            overlap_threshold: default_overlap_threshold(),
            window_secs: default_window_secs(),
            max_pool_size: default_max_pool_size(),
        }
    }
}

fn default_detector_enabled() -> bool {
    true
}

fn default_detector_interval_secs() -> u64 {
    900 // 15 minutes
}

fn default_similarity_threshold() -> f64 {
    0.3
}

fn default_min_cluster_size() -> usize {
    3
}

fn default_max_samples() -> usize {
    5
}

fn default_max_keywords() -> usize {
    8
}

fn default_overlap_threshold() -> f64 {
    0.6
}

fn default_window_secs() -> u64 {
    3600
}

fn default_max_pool_size() -> usize {
    5000
}

/// Escalation scoring configuration.
///
/// Weights are relative; the weighted sum is always clamped to [0, 1].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EscalationConfig {
    #[serde(default = "default_repetition_weight")]
    pub repetition_weight: f64,

    #[serde(default = "default_sentiment_weight")]
    pub sentiment_weight: f64,

    #[serde(default = "default_category_weight")]
    pub category_weight: f64,

    #[serde(default = "default_flag_weight")]
    pub flag_weight: f64,

    /// Trailing window for counting repeated messages, in seconds.
    #[serde(default = "default_repetition_window_secs")]
    pub repetition_window_secs: u64,

    /// Repeats at which the repetition signal saturates at 1.0.
    #[serde(default = "default_repetition_saturation")]
    pub repetition_saturation: u32,

    /// Token Jaccard similarity at which two messages are near-duplicates.
    #[serde(default = "default_near_duplicate_similarity")]
    pub near_duplicate_similarity: f64,

    /// Initial severity band edges. Editable at runtime afterwards.
    #[serde(default)]
    pub bands: BandsConfig,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            repetition_weight: default_repetition_weight(),
            sentiment_weight: default_sentiment_weight(),
            category_weight: default_category_weight(),
            flag_weight: default_flag_weight(),
            repetition_window_secs: default_repetition_window_secs(),
            repetition_saturation: default_repetition_saturation(),
            near_duplicate_similarity: default_near_duplicate_similarity(),
            bands: BandsConfig::default(),
        }
    }
}

fn default_repetition_weight() -> f64 {
    0.35
}

fn default_sentiment_weight() -> f64 {
    0.25
}

fn default_category_weight() -> f64 {
    0.2
}

fn default_flag_weight() -> f64 {
    0.2
}

fn default_repetition_window_secs() -> u64 {
    7 * 24 * 3600
}

fn default_repetition_saturation() -> u32 {
    2
}

fn default_near_duplicate_similarity() -> f64 {
    0.5
}

/// Lower edges of the MEDIUM, HIGH, and CRITICAL risk bands.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BandsConfig {
    #[serde(default = "default_band_medium")]
    pub medium: f64,

    #[serde(default = "default_band_high")]
    pub high: f64,

    #[serde(default = "default_band_critical")]
    pub critical: f64,
}

impl Default for BandsConfig {
    fn default() -> Self {
        Self {
            medium: default_band_medium(),
            high: default_band_high(),
            critical: default_band_critical(),
        }
    }
}

impl From<&BandsConfig> for SeverityBands {
    fn from(b: &BandsConfig) -> Self {
        SeverityBands {
            medium: b.medium,
            high: b.high,
            critical: b.critical,
        }
    }
}

fn default_band_medium() -> f64 {
    0.3
}

fn default_band_high() -> f64 {
    0.6
}

fn default_band_critical() -> f64 {
    0.8
}

/// Delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Transport calls per delivery, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry.
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    /// Cap on a single retry delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Upper bound on one transport call.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Upper bound on one routing log write.
    #[serde(default = "default_audit_timeout_ms")]
    pub audit_timeout_ms: u64,

    /// Sustained sends per minute allowed to a single destination group.
    #[serde(default = "default_rate_per_minute")]
    pub rate_per_minute: u32,

    /// Sends a destination may receive back-to-back before throttling.
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            audit_timeout_ms: default_audit_timeout_ms(),
            rate_per_minute: default_rate_per_minute(),
            burst: default_burst(),
        }
    }
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_send_timeout_ms() -> u64 {
    10_000
}

fn default_audit_timeout_ms() -> u64 {
    5_000
}

fn default_rate_per_minute() -> u32 {
    20
}

fn default_burst() -> u32 {
    5
}

/// Chat transport bridge configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// Base URL of the chat bridge. `None` disables delivery at startup.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer token sent to the bridge.
    #[serde(default)]
    pub api_token: Option<String>,
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token for the API routes. `None` rejects every API request.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3080
}

/// A category created by configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StaticCategoryConfig {
    pub name: String,

    #[serde(default = "default_department")]
    pub department: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub keywords: Vec<String>,

    /// Inherent severity bias (0.0-1.0).
    #[serde(default = "default_severity_bias")]
    pub severity_bias: f64,

    /// Match threshold (0.0-1.0). Falls back to `matcher.default_threshold`.
    #[serde(default)]
    pub threshold: Option<f64>,
}

fn default_department() -> String {
    "general".to_string()
}

fn default_color() -> String {
    "#64748b".to_string()
}

fn default_severity_bias() -> f64 {
    0.5
}

/// A destination group created by configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DestinationConfig {
    /// Chat-transport group identifier.
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default = "default_destination_active")]
    pub active: bool,
}

fn default_destination_active() -> bool {
    true
}

// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end pipeline tests.
//!
//! `TestHarness` assembles a complete engine over a temp SQLite database
//! with [`MockAnalyzer`] and [`MockTransport`] as collaborators. Dispatch
//! timings are shrunk so retry paths finish in milliseconds, and the
//! detector schedule is off; tests run detection explicitly.

use std::sync::Arc;

use beacon_config::model::{BeaconConfig, DestinationConfig, StaticCategoryConfig};
use beacon_core::{
    AnalysisAdapter, BeaconError, InboundMessage, Message, RoutingLogEntry, TransportAdapter,
};
use beacon_engine::{Admin, Engine, ProcessReport};
use beacon_storage::{LogFilter, StoredMessage};
use beacon_storage::queries::messages;
use tokio_util::sync::CancellationToken;

use crate::mock_analyzer::MockAnalyzer;
use crate::mock_transport::MockTransport;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: BeaconConfig,
    analyzer: MockAnalyzer,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = BeaconConfig::default();
        config.detector.enabled = false;
        config.dispatch.base_backoff_ms = 5;
        config.dispatch.max_backoff_ms = 20;
        config.dispatch.send_timeout_ms = 500;
        config.dispatch.audit_timeout_ms = 2_000;
        config.dispatch.rate_per_minute = 6_000;
        config.dispatch.burst = 100;
        config.classifier.timeout_ms = 500;
        Self {
            config,
            analyzer: MockAnalyzer::new(),
        }
    }

    /// Add a static category matched by `keywords`.
    pub fn with_category(mut self, name: &str, keywords: &[&str]) -> Self {
        self.config.categories.push(StaticCategoryConfig {
            name: name.into(),
            department: "ops".into(),
            color: "#ef4444".into(),
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            severity_bias: 0.5,
            threshold: None,
        });
        self
    }

    /// Register an active destination group.
    pub fn with_destination(mut self, id: &str) -> Self {
        self.config.destinations.push(DestinationConfig {
            id: id.into(),
            name: format!("{id} group"),
            active: true,
        });
        self
    }

    pub fn with_analyzer(mut self, analyzer: MockAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Adjust any configuration value before the engine is built.
    pub fn configure(mut self, f: impl FnOnce(&mut BeaconConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Build the harness around a fresh temp database.
    pub async fn build(self) -> Result<TestHarness, BeaconError> {
        let temp_dir = tempfile::TempDir::new()
            .map_err(|e| BeaconError::Internal(format!("temp dir: {e}")))?;
        let db_path = temp_dir.path().join("beacon-test.db");
        let db_path = db_path.to_string_lossy().into_owned();
        TestHarness::open(self.config, self.analyzer, temp_dir, db_path).await
    }
}

/// A complete engine with mock collaborators and temp storage.
pub struct TestHarness {
    /// The engine under test.
    pub engine: Arc<Engine>,
    /// Scriptable analysis service.
    pub analyzer: Arc<MockAnalyzer>,
    /// Recording chat transport.
    pub transport: Arc<MockTransport>,
    db_path: String,
    /// Temp directory kept alive for cleanup on drop.
    temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    async fn open(
        mut config: BeaconConfig,
        analyzer: MockAnalyzer,
        temp_dir: tempfile::TempDir,
        db_path: String,
    ) -> Result<Self, BeaconError> {
        config.storage.database_path = db_path.clone();
        let analyzer = Arc::new(analyzer);
        let transport = Arc::new(MockTransport::new());
        let analysis: Arc<dyn AnalysisAdapter> = Arc::clone(&analyzer) as Arc<dyn AnalysisAdapter>;
        let sender: Arc<dyn TransportAdapter> = Arc::clone(&transport) as Arc<dyn TransportAdapter>;
        let engine = Arc::new(Engine::with_adapters(config, analysis, sender).await?);
        Ok(Self {
            engine,
            analyzer,
            transport,
            db_path,
            temp_dir,
        })
    }

    /// Drop this engine and build a new one over the same database, as a
    /// process restart would. The mocks start fresh.
    pub async fn restart(self) -> Result<Self, BeaconError> {
        let config = self.engine.config().clone();
        let db_path = self.db_path.clone();
        let temp_dir = self.temp_dir;
        drop(self.engine);
        Self::open(config, MockAnalyzer::new(), temp_dir, db_path).await
    }

    pub fn admin(&self) -> &Arc<Admin> {
        self.engine.admin()
    }

    /// Drive one message from `sender` through the full pipeline.
    pub async fn send(&self, sender: &str, text: &str) -> Result<ProcessReport, BeaconError> {
        self.send_with(sender, text, &CancellationToken::new()).await
    }

    pub async fn send_with(
        &self,
        sender: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<ProcessReport, BeaconError> {
        let message = Message::accept(
            uuid::Uuid::new_v4().to_string(),
            InboundMessage {
                sender_id: sender.into(),
                sender_name: String::new(),
                group_id: Some("field-team".into()),
                text: text.into(),
                received_at: None,
            },
        )?;
        self.engine.pipeline().ingest(&message, cancel).await
    }

    /// The stored row for a message.
    pub async fn stored(&self, message_id: &str) -> Result<Option<StoredMessage>, BeaconError> {
        messages::get_message(self.engine.db(), message_id).await
    }

    /// Every routing-log entry for a message, newest first.
    pub async fn log_for(&self, message_id: &str) -> Result<Vec<RoutingLogEntry>, BeaconError> {
        let filter = LogFilter {
            message_id: Some(message_id.to_string()),
            ..LogFilter::default()
        };
        Ok(self.admin().routing_log(&filter, 100, 0).await?.entries)
    }
}

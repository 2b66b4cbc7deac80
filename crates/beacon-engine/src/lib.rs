// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine assembly for Beacon.
//!
//! [`Engine`] wires storage, the classifier, matcher, escalation scorer,
//! rule engine, and dispatcher into one [`Pipeline`], exposes the
//! [`Admin`] services, and on [`Engine::start`] spawns the ingestion
//! worker, the detector schedule, and sender eviction, then replays any
//! message that never recorded an outcome.

pub mod admin;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;
pub mod seed;
pub mod shutdown;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use beacon_bus::EventBus;
use beacon_config::model::BeaconConfig;
use beacon_core::{
    AnalysisAdapter, BeaconError, HealthStatus, Message, PluginAdapter, TransportAdapter,
};
use beacon_detect::{Detector, DetectorSettings};
use beacon_dispatch::{AuditLog, DestinationLimiter, Dispatcher, RetryPolicy};
use beacon_escalation::{EscalationScorer, EscalationWeights, ProfileStore, SharedBands};
use beacon_router::{Catalog, CategoryMatcher, Classifier, LexiconAnalyzer, MatchWeights};
use beacon_storage::Database;
use beacon_storage::queries::messages;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use admin::{Admin, CategoryDraft, MessageStats};
pub use ingest::Ingestor;
pub use pipeline::{Pipeline, ProcessReport};
pub use seed::SeedReport;

/// How often idle sender state is dropped from memory.
pub const SENDER_EVICTION_PERIOD: Duration = Duration::from_secs(600);

/// Health of one collaborator, in a form the gateway can serialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ComponentHealth {
    fn from_status(name: &str, status: Result<HealthStatus, BeaconError>) -> Self {
        let (status, detail) = match status {
            Ok(HealthStatus::Healthy) => ("healthy", None),
            Ok(HealthStatus::Degraded(d)) => ("degraded", Some(d)),
            Ok(HealthStatus::Unhealthy(d)) => ("unhealthy", Some(d)),
            Err(e) => ("unhealthy", Some(e.to_string())),
        };
        Self {
            name: name.to_string(),
            status,
            detail,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

pub struct Engine {
    config: BeaconConfig,
    db: Database,
    bus: EventBus,
    catalog: Arc<Catalog>,
    pipeline: Arc<Pipeline>,
    admin: Arc<Admin>,
    detector: Arc<Detector>,
    profiles: Arc<ProfileStore>,
    analysis: Arc<dyn AnalysisAdapter>,
    transport: Arc<dyn TransportAdapter>,
    seeded: SeedReport,
    ingestor: Ingestor,
    queue: Mutex<Option<mpsc::Receiver<Message>>>,
}

impl Engine {
    /// Build an engine whose collaborators come from configuration: the
    /// HTTP analyzer when an endpoint is set, the lexicon analyzer otherwise.
    pub async fn from_config(config: BeaconConfig) -> Result<Self, BeaconError> {
        let analysis: Arc<dyn AnalysisAdapter> =
            match beacon_bridge::analyzer_from_config(&config.classifier)? {
                Some(http) => Arc::new(http),
                None => Arc::new(LexiconAnalyzer::new()),
            };
        let transport = beacon_bridge::transport_from_config(&config.transport)?;
        Self::with_adapters(config, analysis, transport).await
    }

    pub async fn with_adapters(
        config: BeaconConfig,
        analysis: Arc<dyn AnalysisAdapter>,
        transport: Arc<dyn TransportAdapter>,
    ) -> Result<Self, BeaconError> {
        let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
        Self::assemble(config, db, analysis, transport).await
    }

    /// Wire every stage over an open database.
    pub async fn assemble(
        config: BeaconConfig,
        db: Database,
        analysis: Arc<dyn AnalysisAdapter>,
        transport: Arc<dyn TransportAdapter>,
    ) -> Result<Self, BeaconError> {
        let (seeded, bands) = seed::seed(&db, &config).await?;
        let bands: SharedBands = Arc::new(ArcSwap::from_pointee(bands));
        let bus = EventBus::default();

        let catalog = Arc::new(
            Catalog::load(
                db.clone(),
                Duration::from_secs(config.matcher.snapshot_ttl_secs),
            )
            .await?,
        );
        let classifier = Classifier::new(
            Arc::clone(&analysis),
            Duration::from_millis(config.classifier.timeout_ms),
        );
        let matcher = CategoryMatcher::new(MatchWeights::from(&config.matcher));

        let write_timeout = Duration::from_millis(config.dispatch.audit_timeout_ms);
        let profiles = Arc::new(ProfileStore::new(
            db.clone(),
            Duration::from_secs(config.escalation.repetition_window_secs),
            write_timeout,
        ));
        let scorer = Arc::new(EscalationScorer::new(
            Arc::clone(&profiles),
            EscalationWeights::from(&config.escalation),
            config.escalation.near_duplicate_similarity,
            Arc::clone(&bands),
        ));

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&transport),
            DestinationLimiter::new(config.dispatch.rate_per_minute, config.dispatch.burst),
            AuditLog::new(db.clone(), bus.clone(), write_timeout),
            db.clone(),
            RetryPolicy::from(&config.dispatch),
        ));

        let pipeline = Arc::new(Pipeline::new(
            db.clone(),
            bus.clone(),
            classifier,
            Arc::clone(&catalog),
            matcher,
            Arc::clone(&scorer),
            dispatcher,
        ));

        let detector = Arc::new(Detector::new(
            db.clone(),
            bus.clone(),
            DetectorSettings::from_config(&config.detector, &config.matcher),
        ));

        let admin = Arc::new(Admin::new(
            db.clone(),
            bus.clone(),
            Arc::clone(&catalog),
            scorer,
            Arc::clone(&detector),
            bands,
            config.matcher.default_threshold,
            config.detector.max_samples,
        ));

        let (ingestor, queue) = Ingestor::new(db.clone(), config.engine.queue_capacity);

        info!(
            name = %config.engine.name,
            analysis = analysis.name(),
            transport = transport.name(),
            "engine assembled"
        );

        Ok(Self {
            config,
            db,
            bus,
            catalog,
            pipeline,
            admin,
            detector,
            profiles,
            analysis,
            transport,
            seeded,
            ingestor,
            queue: Mutex::new(Some(queue)),
        })
    }

    pub fn config(&self) -> &BeaconConfig {
        &self.config
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn admin(&self) -> &Arc<Admin> {
        &self.admin
    }

    pub fn detector(&self) -> &Arc<Detector> {
        &self.detector
    }

    pub fn seeded(&self) -> SeedReport {
        self.seeded
    }

    /// Probe storage and both collaborators.
    pub async fn health(&self) -> Vec<ComponentHealth> {
        vec![
            ComponentHealth::from_status("storage", self.db.health_check().await),
            ComponentHealth::from_status(self.analysis.name(), self.analysis.health_check().await),
            ComponentHealth::from_status(
                self.transport.name(),
                self.transport.health_check().await,
            ),
        ]
    }

    /// Spawn background tasks and replay unfinished messages.
    ///
    /// Fails if called twice. Cancelling `cancel` stops everything; await
    /// [`RunningEngine::join`] to let in-flight work finish.
    pub async fn start(&self, cancel: CancellationToken) -> Result<RunningEngine, BeaconError> {
        let queue = self
            .queue
            .lock()
            .map_err(|_| BeaconError::Internal("engine queue lock poisoned".into()))?
            .take()
            .ok_or_else(|| BeaconError::Internal("engine already started".into()))?;

        let pending = messages::unprocessed_messages(&self.db).await?;

        let mut handles = vec![ingest::spawn_worker(
            Arc::clone(&self.pipeline),
            queue,
            self.config.engine.max_in_flight,
            cancel.clone(),
        )];
        if self.config.detector.enabled {
            handles.push(scheduler::spawn_detector(
                Arc::clone(&self.detector),
                Arc::clone(&self.catalog),
                Duration::from_secs(self.config.detector.interval_secs),
                cancel.clone(),
            ));
        }
        handles.push(scheduler::spawn_sender_eviction(
            Arc::clone(&self.profiles),
            SENDER_EVICTION_PERIOD,
            cancel.clone(),
        ));

        let recovered = pending.len();
        if recovered > 0 {
            info!(count = recovered, "replaying unfinished messages");
            let ingestor = self.ingestor.clone();
            handles.push(tokio::spawn(async move {
                for message in pending {
                    if let Err(e) = ingestor.enqueue(message).await {
                        warn!(error = %e, "recovery stopped early");
                        break;
                    }
                }
            }));
        }

        info!(
            max_in_flight = self.config.engine.max_in_flight,
            detector = self.config.detector.enabled,
            "engine started"
        );
        Ok(RunningEngine {
            ingestor: self.ingestor.clone(),
            cancel,
            handles,
            recovered,
        })
    }
}

/// Handle to a started engine.
pub struct RunningEngine {
    ingestor: Ingestor,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    recovered: usize,
}

impl RunningEngine {
    /// Submission handle for inbound messages.
    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    /// Messages replayed from storage at start.
    pub fn recovered(&self) -> usize {
        self.recovered
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait for every background task to finish. They finish once the
    /// token is cancelled.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        info!("engine stopped");
    }

    /// Cancel and wait.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.join().await;
    }
}

// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound message queue and its worker.
//!
//! Submission persists the message before queueing it, so a message that
//! was accepted is never lost: if the queue is closed or the process stops
//! first, startup recovery picks it up from the messages table.

use std::sync::Arc;

use beacon_core::{BeaconError, InboundMessage, Message};
use beacon_storage::Database;
use beacon_storage::queries::messages;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::pipeline::Pipeline;

/// Cloneable submission handle.
#[derive(Clone)]
pub struct Ingestor {
    db: Database,
    tx: mpsc::Sender<Message>,
}

impl Ingestor {
    /// Create a handle and the receiver its worker drains.
    pub fn new(db: Database, capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { db, tx }, rx)
    }

    /// Validate, persist, and enqueue an inbound message.
    pub async fn submit(&self, inbound: InboundMessage) -> Result<Message, BeaconError> {
        let message = Message::accept(uuid::Uuid::new_v4().to_string(), inbound)?;
        messages::insert_message(&self.db, &message).await?;
        self.enqueue(message.clone()).await?;
        debug!(message_id = %message.id, sender_id = %message.sender_id, "message accepted");
        Ok(message)
    }

    /// Queue an already-persisted message.
    pub async fn enqueue(&self, message: Message) -> Result<(), BeaconError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| BeaconError::Internal("ingestion queue is closed".into()))
    }
}

/// Process queued messages with up to `max_in_flight` running at once.
///
/// On cancellation the worker stops taking new work, leaves whatever is
/// still queued for recovery, and waits for running messages to finish.
pub fn spawn_worker(
    pipeline: Arc<Pipeline>,
    mut rx: mpsc::Receiver<Message>,
    max_in_flight: usize,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let limit = max_in_flight.max(1);
    let permits = Arc::new(Semaphore::new(limit));
    tokio::spawn(async move {
        info!(max_in_flight = limit, "ingestion worker started");
        loop {
            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = rx.recv() => match next {
                    Some(m) => m,
                    None => break,
                },
            };
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                p = Arc::clone(&permits).acquire_owned() => match p {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };
            let pipeline = Arc::clone(&pipeline);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let _permit = permit;
                match pipeline.process(&message, &cancel).await {
                    Ok(_) => {}
                    Err(BeaconError::Cancelled) => {
                        debug!(message_id = %message.id, "processing interrupted by shutdown");
                    }
                    Err(e) => {
                        error!(message_id = %message.id, error = %e, "message processing failed");
                    }
                }
            });
        }

        rx.close();
        let mut left = 0usize;
        while rx.recv().await.is_some() {
            left += 1;
        }
        if left > 0 {
            warn!(count = left, "queued messages left for recovery");
        }

        let total = u32::try_from(limit).unwrap_or(u32::MAX);
        if permits.acquire_many(total).await.is_ok() {
            info!("ingestion worker drained");
        }
    })
}

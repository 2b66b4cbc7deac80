// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat transport.
//!
//! Successful sends are captured for assertion. Failures are scripted per
//! destination group and consumed in order; once a group's script runs
//! out, sends to it succeed.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use beacon_core::{
    AdapterType, BeaconError, HealthStatus, PluginAdapter, SendError, TransportAdapter,
};

/// One alert the transport accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentAlert {
    pub group_id: String,
    pub text: String,
}

pub struct MockTransport {
    sent: Mutex<Vec<SentAlert>>,
    scripts: Mutex<HashMap<String, VecDeque<SendError>>>,
    delay: Mutex<Option<Duration>>,
    attempts: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            scripts: Mutex::new(HashMap::new()),
            delay: Mutex::new(None),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Queue failures for the next sends to `group_id`.
    pub async fn fail_next(&self, group_id: &str, failures: Vec<SendError>) {
        self.scripts
            .lock()
            .await
            .entry(group_id.to_string())
            .or_default()
            .extend(failures);
    }

    /// Make every send to `group_id` fail permanently with `reason`.
    pub async fn fail_always(&self, group_id: &str, reason: &str, times: usize) {
        self.fail_next(
            group_id,
            std::iter::repeat_n(SendError::Permanent(reason.into()), times).collect(),
        )
        .await;
    }

    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().await = delay;
    }

    pub async fn sent_messages(&self) -> Vec<SentAlert> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_to(&self, group_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|a| a.group_id == group_id)
            .map(|a| a.text.clone())
            .collect()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Every call to `send`, failed or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, BeaconError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl TransportAdapter for MockTransport {
    async fn send(&self, destination_group_id: &str, text: &str) -> Result<(), SendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self
            .scripts
            .lock()
            .await
            .get_mut(destination_group_id)
            .and_then(VecDeque::pop_front);
        if let Some(err) = scripted {
            return Err(err);
        }
        self.sent.lock().await.push(SentAlert {
            group_id: destination_group_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Injectable per-sender profile store.
//!
//! One async mutex per sender id. Holding a sender's guard is the only way
//! to read-modify-write its counters, so concurrent messages from one
//! sender are serialized while different senders proceed in parallel.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use beacon_core::{BeaconError, SenderProfile};
use beacon_storage::queries::{messages, senders};
use beacon_storage::{Database, PriorMessage};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

/// In-memory state for one sender.
#[derive(Debug)]
pub struct SenderState {
    pub profile: SenderProfile,
    /// Processed messages inside the repetition window, oldest first.
    pub recent: VecDeque<PriorMessage>,
    /// False once storage has been consulted for this sender.
    needs_hydration: bool,
    /// Whether a profile row exists or has been written.
    pub persisted: bool,
}

impl SenderState {
    fn blank(sender_id: &str) -> Self {
        Self {
            profile: SenderProfile::new(sender_id, Utc::now()),
            recent: VecDeque::new(),
            needs_hydration: true,
            persisted: false,
        }
    }

    /// Drop window entries received before `cutoff`.
    pub fn prune(&mut self, cutoff: DateTime<Utc>) {
        while self.recent.front().is_some_and(|m| m.received_at < cutoff) {
            self.recent.pop_front();
        }
    }
}

/// Sender profiles keyed by sender id, backed by storage.
pub struct ProfileStore {
    db: Database,
    window: chrono::Duration,
    write_timeout: Duration,
    senders: DashMap<String, Arc<Mutex<SenderState>>>,
}

impl ProfileStore {
    pub fn new(db: Database, window: Duration, write_timeout: Duration) -> Self {
        Self {
            db,
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX),
            write_timeout,
            senders: DashMap::new(),
        }
    }

    /// Length of the trailing repetition window.
    pub fn window(&self) -> chrono::Duration {
        self.window
    }

    /// Acquire the sender's guard, hydrating from storage on first use.
    ///
    /// A failed hydration yields a blank profile and is retried on the
    /// next acquisition.
    pub async fn lock(&self, sender_id: &str) -> OwnedMutexGuard<SenderState> {
        let cell = self
            .senders
            .entry(sender_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SenderState::blank(sender_id))))
            .clone();
        let mut guard = cell.lock_owned().await;
        if guard.needs_hydration {
            self.hydrate(sender_id, &mut guard).await;
        }
        guard
    }

    async fn hydrate(&self, sender_id: &str, state: &mut SenderState) {
        let since = Utc::now()
            .checked_sub_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let profile = senders::get_profile(&self.db, sender_id).await;
        let recent = messages::recent_for_sender(&self.db, sender_id, since).await;
        match (profile, recent) {
            (Ok(profile), Ok(recent)) => {
                if let Some(p) = profile {
                    state.profile = p;
                    state.persisted = true;
                }
                state.recent = recent.into_iter().collect();
                state.needs_hydration = false;
                debug!(sender_id, window = state.recent.len(), "sender hydrated");
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(sender_id, error = %e, "sender hydration failed, using blank profile");
            }
        }
    }

    /// Persist the guarded profile, bounded by the write timeout.
    pub async fn persist(&self, state: &mut SenderState) -> Result<(), BeaconError> {
        let profile = state.profile.clone();
        self.write(state, senders::upsert_profile(&self.db, &profile))
            .await
    }

    /// Persist the profile together with the marker that `message_id` has
    /// been counted in it.
    pub async fn persist_counted(
        &self,
        state: &mut SenderState,
        message_id: &str,
    ) -> Result<(), BeaconError> {
        let profile = state.profile.clone();
        let write = senders::upsert_profile_counting(&self.db, &profile, message_id);
        self.write(state, write).await
    }

    async fn write(
        &self,
        state: &mut SenderState,
        write: impl Future<Output = Result<(), BeaconError>>,
    ) -> Result<(), BeaconError> {
        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(())) => {
                state.persisted = true;
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BeaconError::Timeout {
                duration: self.write_timeout,
            }),
        }
    }

    /// Snapshot of one sender's profile, from memory or storage.
    pub async fn get(&self, sender_id: &str) -> Result<Option<SenderProfile>, BeaconError> {
        let cell = self.senders.get(sender_id).map(|c| Arc::clone(c.value()));
        if let Some(cell) = cell {
            let guard = cell.lock().await;
            if !guard.needs_hydration && guard.persisted {
                return Ok(Some(guard.profile.clone()));
            }
        }
        senders::get_profile(&self.db, sender_id).await
    }

    /// Drop idle senders whose window is empty. Senders that are locked,
    /// or whose cell a caller of [`lock`](Self::lock) already holds, are kept.
    pub fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now.checked_sub_signed(self.window).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let before = self.senders.len();
        self.senders.retain(|_, cell| {
            if Arc::strong_count(cell) > 1 {
                return true;
            }
            match cell.try_lock() {
                Ok(mut state) => {
                    state.prune(cutoff);
                    !state.recent.is_empty()
                }
                Err(_) => true,
            }
        });
        before - self.senders.len()
    }

    /// Number of senders held in memory.
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

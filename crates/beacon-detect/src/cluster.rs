// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token-overlap clustering of unmatched messages.
//!
//! Single pass, oldest message first. Each message joins the existing
//! cluster whose signature it resembles most (Jaccard at or above the
//! similarity threshold, earliest cluster on ties) or starts a new one.
//! A cluster's signature is the set of terms carried by at least half of
//! its members.

use std::collections::{BTreeMap, BTreeSet};

use beacon_core::text;
use beacon_storage::UnmatchedMessage;
use chrono::{DateTime, Duration, Utc};

/// One pooled message, tokenized.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolEntry {
    pub message_id: String,
    pub text: String,
    pub tokens: BTreeSet<String>,
    pub received_at: DateTime<Utc>,
}

impl From<UnmatchedMessage> for PoolEntry {
    fn from(m: UnmatchedMessage) -> Self {
        let mut tokens = text::tokenize(&m.text);
        for term in &m.entity_terms {
            tokens.extend(text::tokenize(term));
        }
        Self {
            message_id: m.message_id,
            text: m.text,
            tokens,
            received_at: m.received_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Cluster {
    pub members: Vec<PoolEntry>,
    term_counts: BTreeMap<String, usize>,
    signature: BTreeSet<String>,
}

impl Cluster {
    fn seed(entry: PoolEntry) -> Self {
        let mut cluster = Self {
            members: Vec::new(),
            term_counts: BTreeMap::new(),
            signature: BTreeSet::new(),
        };
        cluster.push(entry);
        cluster
    }

    fn push(&mut self, entry: PoolEntry) {
        for t in &entry.tokens {
            *self.term_counts.entry(t.clone()).or_insert(0) += 1;
        }
        self.members.push(entry);
        let quorum = self.members.len().div_ceil(2);
        self.signature = self
            .term_counts
            .iter()
            .filter(|(_, n)| **n >= quorum)
            .map(|(t, _)| t.clone())
            .collect();
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn signature(&self) -> &BTreeSet<String> {
        &self.signature
    }

    pub fn member_ids(&self) -> Vec<String> {
        self.members.iter().map(|m| m.message_id.clone()).collect()
    }

    /// Up to `max` most frequent terms, alphabetical within equal counts,
    /// returned in sorted order.
    pub fn keywords(&self, max: usize) -> Vec<String> {
        let mut ranked: Vec<(&String, &usize)> = self.term_counts.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let mut top: Vec<String> = ranked.into_iter().take(max).map(|(t, _)| t.clone()).collect();
        top.sort();
        top
    }

    /// Display name built from the two most frequent terms.
    pub fn name(&self) -> String {
        let mut ranked: Vec<(&String, &usize)> = self.term_counts.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        ranked
            .into_iter()
            .take(2)
            .map(|(t, _)| capitalize(t))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Mean Jaccard similarity of members to the signature, in [0, 1].
    pub fn cohesion(&self) -> f64 {
        if self.members.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .members
            .iter()
            .map(|m| text::jaccard(&m.tokens, &self.signature))
            .sum();
        total / self.members.len() as f64
    }

    /// `(recent - prior) / max(prior, 1)` over two adjacent windows ending at `now`.
    pub fn trend(&self, now: DateTime<Utc>, window: Duration) -> f64 {
        let recent_start = now - window;
        let prior_start = recent_start - window;
        let recent = self
            .members
            .iter()
            .filter(|m| m.received_at >= recent_start && m.received_at <= now)
            .count() as f64;
        let prior = self
            .members
            .iter()
            .filter(|m| m.received_at >= prior_start && m.received_at < recent_start)
            .count() as f64;
        (recent - prior) / prior.max(1.0)
    }

    /// Texts of the `max` most recent members, oldest first.
    pub fn samples(&self, max: usize) -> Vec<String> {
        let skip = self.members.len().saturating_sub(max);
        self.members.iter().skip(skip).map(|m| m.text.clone()).collect()
    }

    pub fn first_seen(&self) -> Option<DateTime<Utc>> {
        self.members.iter().map(|m| m.received_at).min()
    }
}

fn capitalize(term: &str) -> String {
    let mut chars = term.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Group `entries` (oldest first) by token overlap.
pub fn cluster(entries: Vec<PoolEntry>, similarity: f64) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();
    for entry in entries {
        if entry.tokens.is_empty() {
            continue;
        }
        let mut best: Option<(usize, f64)> = None;
        for (i, c) in clusters.iter().enumerate() {
            let sim = text::jaccard(&entry.tokens, c.signature());
            if sim >= similarity && best.is_none_or(|(_, s)| sim > s) {
                best = Some((i, sim));
            }
        }
        match best {
            Some((i, _)) => clusters[i].push(entry),
            None => clusters.push(Cluster::seed(entry)),
        }
    }
    clusters
}

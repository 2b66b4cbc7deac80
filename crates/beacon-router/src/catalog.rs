// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-mostly snapshots of the approved category set and the routing table.
//!
//! Each evaluation grabs one `Arc` and works against it to completion, so a
//! concurrent approve or rule edit is either fully visible or not at all.
//! Writers rebuild a snapshot from storage and swap it in.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use beacon_core::{
    BeaconError, Category, CategoryId, CategoryStatus, DestinationGroup, RoutingRule, text,
};
use beacon_storage::queries::{categories, destinations, rules};
use beacon_storage::Database;
use tracing::{debug, warn};

/// An approved category with its match vocabulary precomputed.
#[derive(Debug, Clone)]
pub struct CategoryProfile {
    pub category: Category,
    /// Keywords plus tokens of the category name.
    pub vocabulary: BTreeSet<String>,
}

impl CategoryProfile {
    pub fn new(category: Category) -> Self {
        let mut vocabulary = text::tokenize(&category.name);
        vocabulary.extend(category.keywords.iter().cloned());
        Self {
            category,
            vocabulary,
        }
    }
}

/// Approved categories, ascending by id.
#[derive(Debug)]
pub struct CategorySnapshot {
    pub categories: Vec<CategoryProfile>,
    loaded_at: Instant,
}

impl CategorySnapshot {
    pub fn new(mut categories: Vec<Category>) -> Self {
        categories.retain(|c| c.status == CategoryStatus::Approved);
        categories.sort_by_key(|c| c.id);
        Self {
            categories: categories.into_iter().map(CategoryProfile::new).collect(),
            loaded_at: Instant::now(),
        }
    }

    pub fn get(&self, id: CategoryId) -> Option<&Category> {
        self.categories
            .binary_search_by_key(&id, |p| p.category.id)
            .ok()
            .map(|i| &self.categories[i].category)
    }

    fn age(&self) -> Duration {
        self.loaded_at.elapsed()
    }
}

/// Routing rules (priority, then id) and the destination registry.
#[derive(Debug, Default)]
pub struct RoutingSnapshot {
    pub rules: Vec<RoutingRule>,
    pub destinations: HashMap<String, DestinationGroup>,
}

impl RoutingSnapshot {
    pub fn new(mut rules: Vec<RoutingRule>, destinations: Vec<DestinationGroup>) -> Self {
        rules.sort_by_key(|r| (r.priority, r.id));
        Self {
            rules,
            destinations: destinations.into_iter().map(|d| (d.id.clone(), d)).collect(),
        }
    }
}

/// Shared holder for both snapshots.
pub struct Catalog {
    db: Database,
    ttl: Duration,
    categories: ArcSwap<CategorySnapshot>,
    routing: ArcSwap<RoutingSnapshot>,
}

impl Catalog {
    /// Load both snapshots from storage.
    pub async fn load(db: Database, ttl: Duration) -> Result<Self, BeaconError> {
        let categories = load_categories(&db).await?;
        let routing = load_routing(&db).await?;
        Ok(Self {
            db,
            ttl,
            categories: ArcSwap::from_pointee(categories),
            routing: ArcSwap::from_pointee(routing),
        })
    }

    /// Current approved set, reloading first if older than the TTL.
    ///
    /// A failed reload keeps serving the previous snapshot.
    pub async fn categories(&self) -> Arc<CategorySnapshot> {
        let current = self.categories.load_full();
        if current.age() < self.ttl {
            return current;
        }
        match self.refresh_categories().await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(error = %e, "category snapshot reload failed, serving stale set");
                current
            }
        }
    }

    /// Current routing table.
    pub fn routing(&self) -> Arc<RoutingSnapshot> {
        self.routing.load_full()
    }

    /// Rebuild the category snapshot now.
    pub async fn refresh_categories(&self) -> Result<Arc<CategorySnapshot>, BeaconError> {
        let fresh = Arc::new(load_categories(&self.db).await?);
        self.categories.store(Arc::clone(&fresh));
        debug!(approved = fresh.categories.len(), "category snapshot refreshed");
        Ok(fresh)
    }

    /// Rebuild the routing snapshot now.
    pub async fn refresh_routing(&self) -> Result<(), BeaconError> {
        let fresh = load_routing(&self.db).await?;
        debug!(
            rules = fresh.rules.len(),
            destinations = fresh.destinations.len(),
            "routing snapshot refreshed"
        );
        self.routing.store(Arc::new(fresh));
        Ok(())
    }
}

async fn load_categories(db: &Database) -> Result<CategorySnapshot, BeaconError> {
    let approved = categories::list_categories(db, Some(CategoryStatus::Approved)).await?;
    Ok(CategorySnapshot::new(approved))
}

async fn load_routing(db: &Database) -> Result<RoutingSnapshot, BeaconError> {
    let rules = rules::list_rules(db).await?;
    let destinations = destinations::list_destinations(db).await?;
    Ok(RoutingSnapshot::new(rules, destinations))
}

//! Frontier queue and visited store
//!
//! The visited store is the single point where duplicate work is prevented:
//! a key is claimed at most once for the whole run. The frontier is a plain
//! FIFO queue, giving relaxed breadth-first traversal when several workers
//! drain it.

use crate::config::CrawlerConfig;
use crate::state::{DiscoveryTarget, TargetKind};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// Set of URL keys that have been claimed for processing
#[derive(Debug, Default)]
pub struct VisitedStore {
    keys: Mutex<HashSet<String>>,
}

impl VisitedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claims a key
    ///
    /// Returns true if the key was unclaimed and is now claimed by the caller.
    pub fn try_claim(&self, key: &str) -> bool {
        match self.keys.lock() {
            Ok(mut keys) => keys.insert(key.to_string()),
            Err(poisoned) => poisoned.into_inner().insert(key.to_string()),
        }
    }

    /// Returns true if the key has already been claimed
    pub fn is_claimed(&self, key: &str) -> bool {
        match self.keys.lock() {
            Ok(keys) => keys.contains(key),
            Err(poisoned) => poisoned.into_inner().contains(key),
        }
    }

    /// Number of claimed keys
    pub fn len(&self) -> usize {
        match self.keys.lock() {
            Ok(keys) => keys.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of offering a target to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Claimed and appended to the queue
    Queued,
    /// Key already claimed
    Duplicate,
    /// Deeper than `max_depth`; the key was not claimed
    TooDeep,
    /// The per-kind cap is exhausted; the key was not claimed
    CapReached,
}

/// Admission limits of a frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontierLimits {
    pub max_depth: u32,
    pub max_containers: usize,
    pub max_items: usize,
}

impl FrontierLimits {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            max_containers: config.max_containers,
            max_items: config.max_items,
        }
    }
}

/// FIFO of pending discovery targets
#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<DiscoveryTarget>,
    visited: Arc<VisitedStore>,
    limits: FrontierLimits,
    containers_admitted: usize,
    items_admitted: usize,
}

impl Frontier {
    pub fn new(visited: Arc<VisitedStore>, limits: FrontierLimits) -> Self {
        Self {
            queue: VecDeque::new(),
            visited,
            limits,
            containers_admitted: 0,
            items_admitted: 0,
        }
    }

    /// Offers a target for admission
    ///
    /// Checks run in order: depth, then the per-kind cap, then the claim.
    /// Only the claim marks the key as visited.
    pub fn admit(&mut self, target: DiscoveryTarget) -> Admission {
        self.admit_with(target, true)
    }

    /// Admits a configured seed
    ///
    /// Seeds count toward the per-kind caps but are never refused by them.
    pub fn seed(&mut self, target: DiscoveryTarget) -> Admission {
        self.admit_with(target, false)
    }

    fn admit_with(&mut self, target: DiscoveryTarget, enforce_caps: bool) -> Admission {
        if target.depth() > self.limits.max_depth {
            tracing::trace!("Dropping {} (too deep)", target);
            return Admission::TooDeep;
        }

        let (admitted, cap) = match target.kind() {
            TargetKind::Container => (self.containers_admitted, self.limits.max_containers),
            TargetKind::Item => (self.items_admitted, self.limits.max_items),
        };
        if enforce_caps && admitted >= cap {
            tracing::trace!("Dropping {} ({} cap reached)", target, target.kind());
            return Admission::CapReached;
        }

        if !self.visited.try_claim(target.key()) {
            return Admission::Duplicate;
        }

        match target.kind() {
            TargetKind::Container => self.containers_admitted += 1,
            TargetKind::Item => self.items_admitted += 1,
        }
        tracing::trace!("Queued {}", target);
        self.queue.push_back(target);
        Admission::Queued
    }

    pub fn dequeue(&mut self) -> Option<DiscoveryTarget> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn containers_admitted(&self) -> usize {
        self.containers_admitted
    }

    pub fn items_admitted(&self) -> usize {
        self.items_admitted
    }
}

//! Per-cluster destination registry.
//!
//! # Responsibilities
//! - Own the live destinations of one cluster
//! - Idempotent creation by id
//! - Publish immutable point-in-time snapshots for enumeration
//!
//! # Design Decisions
//! - Readers `load_full()` an `Arc<Vec<_>>`; they never lock and a held
//!   snapshot never changes underneath them
//! - Writers are serialized by a mutex and publish a fresh vector
//!   (copy-on-write); writes only happen on config reload
//! - Snapshot order is insertion order

use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::cluster::destination::{Destination, DestinationConfig};

/// Immutable view of a registry at one point in time.
pub type DestinationSnapshot = Arc<Vec<Arc<Destination>>>;

#[derive(Debug, Default)]
pub struct DestinationRegistry {
    items: ArcSwap<Vec<Arc<Destination>>>,
    write_lock: Mutex<()>,
}

impl DestinationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current destinations, in insertion order.
    pub fn snapshot(&self) -> DestinationSnapshot {
        self.items.load_full()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Destination>> {
        self.items.load().iter().find(|d| d.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the destination for `id`, creating it with `init` if absent.
    ///
    /// `init` runs at most once per created destination; concurrent callers
    /// with the same id all observe the same instance.
    pub fn get_or_create<F>(&self, id: &str, init: F) -> Arc<Destination>
    where
        F: FnOnce() -> DestinationConfig,
    {
        if let Some(existing) = self.get(id) {
            return existing;
        }

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.items.load_full();
        if let Some(existing) = current.iter().find(|d| d.id() == id) {
            return existing.clone();
        }

        let destination = Arc::new(Destination::new(id, init()));
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(destination.clone());
        self.items.store(Arc::new(next));

        tracing::debug!(destination = %id, "Destination created");
        destination
    }

    /// Detach a destination from future snapshots.
    ///
    /// References already held (by snapshots or in-flight requests) stay valid.
    pub fn remove(&self, id: &str) -> Option<Arc<Destination>> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.items.load_full();
        let position = current.iter().position(|d| d.id() == id)?;

        let mut next: Vec<_> = current.iter().cloned().collect();
        let removed = next.remove(position);
        self.items.store(Arc::new(next));

        tracing::debug!(destination = %id, "Destination removed");
        Some(removed)
    }
}

//! Metrics collection.
//!
//! This module handles:
//! - Snapshot payload types
//! - The introspection capability and its live implementation
//! - Linux `/proc` parsing
//! - Merging the three sources into a timestamped snapshot

pub mod introspect;
pub mod procfs;
pub mod types;

use std::sync::Arc;
use std::time::Instant;

use time::OffsetDateTime;
use tracing::{debug, instrument};

use crate::error::CollectionError;
use crate::telemetry;

pub use introspect::{mark_process_start, Introspect, LiveIntrospector};
pub use types::{MetricsSnapshot, ProcessMetrics, RuntimeHeapMetrics, SystemMetrics};

/// Builds a fresh [`MetricsSnapshot`] on every call. Nothing is cached.
#[derive(Clone)]
pub struct MetricsCollector {
    source: Arc<dyn Introspect>,
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector").finish_non_exhaustive()
    }
}

impl MetricsCollector {
    /// Create a collector over an introspection source.
    pub fn new(source: Arc<dyn Introspect>) -> Self {
        Self { source }
    }

    /// Create a collector that reads the real machine.
    pub fn live() -> Self {
        Self::new(Arc::new(LiveIntrospector::new()))
    }

    /// Read all three sources and stamp the result with the current UTC time.
    #[instrument(skip(self))]
    pub fn collect(&self) -> Result<MetricsSnapshot, CollectionError> {
        let start = Instant::now();
        let result = self.read_all();
        telemetry::record_collection_latency(start);

        match result {
            Ok(snapshot) => {
                debug!(cpus = snapshot.system.cpus.len(), "metrics snapshot collected");
                Ok(snapshot)
            }
            Err(e) => {
                telemetry::inc_collection_failures();
                Err(e)
            }
        }
    }

    fn read_all(&self) -> Result<MetricsSnapshot, CollectionError> {
        Ok(MetricsSnapshot {
            system: self.source.read_host_info()?,
            heap: self.source.read_heap_info()?,
            process: self.source.read_process_info()?,
            timestamp: OffsetDateTime::now_utc(),
        })
    }
}

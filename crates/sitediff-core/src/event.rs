//! Progress events emitted by the comparison pipeline
//!
//! The pipeline never writes to the console. It reports through an
//! [`EventSink`] supplied by the caller; [`TracingSink`] is the default.

use crate::raster_diff::Dimensions;
use crate::types::ComparisonStatus;
use parking_lot::Mutex;
use std::path::PathBuf;

/// Pipeline event
#[derive(Debug, Clone, PartialEq)]
pub enum CompareEvent {
    /// Run started
    Started {
        /// Paths in the universe
        total: usize,
        /// Maximum paths compared at once
        concurrency: usize,
    },
    /// Comparison of a path began
    Comparing {
        /// Page path
        path: String,
    },
    /// Path is missing from one or both variants
    Missing {
        /// Page path
        path: String,
        /// Which side is missing
        status: ComparisonStatus,
    },
    /// Screenshots differ in size; only the overlap is compared
    SizeMismatch {
        /// Page path
        path: String,
        /// Reference screenshot size
        reference: Dimensions,
        /// Candidate screenshot size
        candidate: Dimensions,
    },
    /// An artifact was written
    ArtifactWritten {
        /// Page path
        path: String,
        /// Written file
        artifact: PathBuf,
    },
    /// Comparison of a path failed
    Failed {
        /// Page path
        path: String,
        /// Failure description
        error: String,
    },
    /// Record dropped by the mismatch threshold
    Filtered {
        /// Page path
        path: String,
        /// Score of the dropped record
        match_score: u8,
    },
    /// Run finished
    Finished {
        /// Paths compared
        compared: usize,
        /// Records kept after filtering
        retained: usize,
    },
}

/// Receiver of pipeline events
///
/// Called concurrently from worker tasks.
pub trait EventSink: Send + Sync {
    /// Handle one event
    fn emit(&self, event: &CompareEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &CompareEvent) {
        match event {
            CompareEvent::Started { total, concurrency } => {
                tracing::info!(total, concurrency, "comparing pages");
            }
            CompareEvent::Comparing { path } => tracing::info!(%path, "comparing"),
            CompareEvent::Missing { path, status } => {
                tracing::warn!(%path, %status, "page missing");
            }
            CompareEvent::SizeMismatch {
                path,
                reference,
                candidate,
            } => tracing::warn!(
                %path,
                %reference,
                %candidate,
                "Screenshot size mismatch; comparing overlapping area"
            ),
            CompareEvent::ArtifactWritten { path, artifact } => {
                tracing::debug!(%path, artifact = %artifact.display(), "artifact written");
            }
            CompareEvent::Failed { path, error } => {
                tracing::error!(%path, %error, "comparison failed");
            }
            CompareEvent::Filtered { path, match_score } => {
                tracing::debug!(%path, match_score, "below mismatch threshold, dropped");
            }
            CompareEvent::Finished { compared, retained } => {
                tracing::info!(compared, retained, "comparison finished");
            }
        }
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &CompareEvent) {}
}

/// Collects events in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<CompareEvent>>,
}

impl MemorySink {
    /// Create empty sink
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of collected events
    #[must_use]
    pub fn events(&self) -> Vec<CompareEvent> {
        self.events.lock().clone()
    }

    /// Count events matching a predicate
    pub fn count(&self, predicate: impl Fn(&CompareEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &CompareEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_collects() {
        let sink = MemorySink::new();
        sink.emit(&CompareEvent::Comparing { path: "/".into() });
        sink.emit(&CompareEvent::Failed {
            path: "/".into(),
            error: "boom".into(),
        });

        assert_eq!(sink.events().len(), 2);
        assert_eq!(
            sink.count(|e| matches!(e, CompareEvent::Failed { .. })),
            1
        );
    }

    #[test]
    fn tracing_sink_accepts_all_events() {
        let sink = TracingSink;
        sink.emit(&CompareEvent::SizeMismatch {
            path: "/".into(),
            reference: Dimensions::new(1, 1),
            candidate: Dimensions::new(2, 2),
        });
        sink.emit(&CompareEvent::Finished {
            compared: 1,
            retained: 1,
        });
    }
}

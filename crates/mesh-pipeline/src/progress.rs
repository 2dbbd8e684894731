// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bounded, non-blocking stage progress reporting.
//!
//! Multi-producer, single-consumer. Producers never block: when the
//! buffer is full the event is dropped and counted. The owning
//! pipeline closes the channel exactly once; clones observe the close.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use mesh_core::Stage;
use serde::Serialize;
use tokio::sync::mpsc;

/// Buffered event capacity of a reporter channel.
pub const PROGRESS_CAPACITY: usize = 64;

/// Where a section task is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    /// Assigned, not yet dispatched.
    Pending,
    /// Dispatched to an agent.
    Working,
    /// Finished successfully.
    Complete,
    /// Finished with an error (including cancellation).
    Failed,
}

impl std::fmt::Display for ProgressState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Working => "working",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One progress event.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Stage the section belongs to.
    pub stage: Stage,
    /// Section being produced.
    pub section: String,
    /// Agent (endpoint or fallback label) working the section.
    pub agent: String,
    /// Lifecycle state.
    pub state: ProgressState,
    /// Optional human-readable detail (error text on failure).
    pub detail: Option<String>,
}

struct ReporterInner {
    tx: std::sync::Mutex<Option<mpsc::Sender<ProgressEvent>>>,
    dropped: AtomicU64,
}

/// Cloneable producer handle of the progress channel.
#[derive(Clone)]
pub struct ProgressReporter {
    inner: Arc<ReporterInner>,
}

impl ProgressReporter {
    /// A reporter with the default capacity and its consumer side.
    #[must_use]
    pub fn channel() -> (Self, mpsc::Receiver<ProgressEvent>) {
        Self::with_capacity(PROGRESS_CAPACITY)
    }

    /// A reporter with an explicit buffer capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                inner: Arc::new(ReporterInner {
                    tx: std::sync::Mutex::new(Some(tx)),
                    dropped: AtomicU64::new(0),
                }),
            },
            rx,
        )
    }

    /// Emit without blocking; drops the event when the buffer is full
    /// or the channel is closed.
    pub fn emit(&self, event: ProgressEvent) {
        let guard = self.inner.tx.lock().expect("reporter lock poisoned");
        let delivered = guard
            .as_ref()
            .is_some_and(|tx| tx.try_send(event).is_ok());
        if !delivered {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Convenience: emit one section-state transition.
    pub fn section(
        &self,
        stage: Stage,
        section: &str,
        agent: &str,
        state: ProgressState,
        detail: Option<String>,
    ) {
        self.emit(ProgressEvent {
            stage,
            section: section.to_string(),
            agent: agent.to_string(),
            state,
            detail,
        });
    }

    /// Close the channel. Idempotent across clones; subscribers see
    /// end-of-stream once in-flight events drain.
    pub fn close(&self) {
        self.inner
            .tx
            .lock()
            .expect("reporter lock poisoned")
            .take();
    }

    /// How many events were dropped (full buffer or closed channel).
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(state: ProgressState) -> ProgressEvent {
        ProgressEvent {
            stage: Stage::DesignPack,
            section: "assumptions".into(),
            agent: "research".into(),
            state,
            detail: None,
        }
    }

    #[tokio::test]
    async fn events_arrive_in_producer_order() {
        let (reporter, mut rx) = ProgressReporter::channel();
        reporter.emit(event(ProgressState::Pending));
        reporter.emit(event(ProgressState::Working));
        reporter.emit(event(ProgressState::Complete));
        reporter.close();

        let mut seen = Vec::new();
        while let Some(e) = rx.recv().await {
            seen.push(e.state);
        }
        assert_eq!(
            seen,
            [
                ProgressState::Pending,
                ProgressState::Working,
                ProgressState::Complete
            ]
        );
    }

    #[tokio::test]
    async fn full_buffer_drops_instead_of_blocking() {
        let (reporter, _rx) = ProgressReporter::with_capacity(2);
        for _ in 0..5 {
            reporter.emit(event(ProgressState::Working));
        }
        assert_eq!(reporter.dropped(), 3);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_shared_by_clones() {
        let (reporter, mut rx) = ProgressReporter::channel();
        let clone = reporter.clone();
        reporter.close();
        reporter.close();
        clone.emit(event(ProgressState::Working));
        assert_eq!(clone.dropped(), 1);
        assert!(rx.recv().await.is_none());
    }
}

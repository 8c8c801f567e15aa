//! Sticky latching of engine notifications, drained by polling.
//!
//! Engine notifications arrive on engine-owned threads at arbitrary times;
//! the application only ever asks "did any of these happen since I last
//! asked?". Each notification sets one atomic flag; [`EventLatch::poll`]
//! snapshots and clears them. Multiple occurrences between polls collapse
//! into one report; the latch records *that* something happened, not how
//! often.

use std::sync::atomic::{AtomicBool, Ordering};

/// Snapshot of the latched notifications, as returned by one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFlags {
    /// The engine graph's process order changed.
    pub graph_ordering: bool,
    /// A port appeared in or vanished from the engine graph.
    pub port_registration: bool,
    /// The engine shut this client down.
    pub shutdown: bool,
    /// The application side asked the session to wind down.
    pub hangup: bool,
}

impl EventFlags {
    /// `true` if any flag in the snapshot is raised.
    #[inline]
    pub fn any(self) -> bool {
        self.graph_ordering || self.port_registration || self.shutdown || self.hangup
    }
}

/// Set of sticky notification flags with poll-and-reset semantics.
///
/// Setting is idempotent and wait-free; it is safe from any thread,
/// including notification threads that must not block.
///
/// # Example
///
/// ```rust
/// use puente_core::EventLatch;
///
/// let latch = EventLatch::new();
/// assert!(!latch.poll().any());
///
/// latch.note_graph_reorder();
/// latch.note_graph_reorder(); // collapses into one report
///
/// let flags = latch.poll();
/// assert!(flags.graph_ordering && !flags.shutdown);
/// assert!(!latch.poll().any()); // the poll cleared it
/// ```
#[derive(Debug, Default)]
pub struct EventLatch {
    graph_ordering: AtomicBool,
    port_registration: AtomicBool,
    shutdown: AtomicBool,
    hangup: AtomicBool,
    // Latched on a sample-rate notification but not reported by `poll`:
    // the geometry never resizes on a rate change, and callers wanting the
    // new rate query the engine directly.
    sample_rate: AtomicBool,
}

impl EventLatch {
    /// A latch with every flag down.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latches a graph-reorder notification.
    #[inline]
    pub fn note_graph_reorder(&self) {
        self.graph_ordering.store(true, Ordering::Release);
    }

    /// Latches a port-registration notification.
    #[inline]
    pub fn note_port_registration(&self) {
        self.port_registration.store(true, Ordering::Release);
    }

    /// Latches an engine shutdown.
    #[inline]
    pub fn note_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Latches an application-side hangup.
    #[inline]
    pub fn note_hangup(&self) {
        self.hangup.store(true, Ordering::Release);
    }

    /// Latches a sample-rate change. Not surfaced by [`poll`](Self::poll).
    #[inline]
    pub fn note_sample_rate_change(&self) {
        self.sample_rate.store(true, Ordering::Release);
    }

    /// Snapshots the four reported flags and clears them.
    ///
    /// Each flag is drained atomically; a notification landing while the
    /// poll runs is picked up by this poll or the next one, never lost.
    pub fn poll(&self) -> EventFlags {
        EventFlags {
            graph_ordering: self.graph_ordering.swap(false, Ordering::AcqRel),
            port_registration: self.port_registration.swap(false, Ordering::AcqRel),
            shutdown: self.shutdown.swap(false, Ordering::AcqRel),
            hangup: self.hangup.swap(false, Ordering::AcqRel),
        }
    }

    /// Clears every flag, including the unreported sample-rate latch.
    ///
    /// Called when a session starts so that events from a previous
    /// attachment cannot leak into the new one.
    pub fn reset(&self) {
        self.poll();
        self.sample_rate.store(false, Ordering::Release);
    }
}

//! Pluggable audio engine abstraction.
//!
//! This module defines the [`AudioEngine`] trait, which decouples the client
//! from any specific audio server API. The client only ever talks to the
//! engine through this boundary: it opens a named session, registers ports,
//! asks for graph changes, and hands over one per-period process callback
//! plus four notification callbacks.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │         Application          │
//! └──────────────┬───────────────┘
//!                │ Client API (exchange, poll_events, ...)
//!                ▼
//! ┌──────────────────────────────┐
//! │        AudioEngine trait     │
//! │  open / ports / activate     │
//! └──────────────┬───────────────┘
//!                │ implemented by
//!        ┌───────┴────────┐
//!        ▼                ▼
//! ┌─────────────┐  ┌─────────────┐
//! │ live audio  │  │ MockEngine  │
//! │ server glue │  │ (in-process)│
//! └─────────────┘  └─────────────┘
//! ```
//!
//! ## Design Rationale (ADR-031)
//!
//! The trait uses boxed closures for callbacks rather than generic
//! parameters, making `AudioEngine` object-safe and enabling runtime engine
//! selection via `Box<dyn AudioEngine>`. Per-cycle port buffers are reached
//! through the [`PortIo`] view instead of raw pointers, so engine-specific
//! buffer management never leaks into the client.

use puente_core::{PortFlags, PortHandle};

/// The engine rejected or failed a delegated call.
///
/// Deliberately opaque: the client maps every delegated failure to one error
/// variant and forwards the engine's message verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct EngineError(String);

impl EngineError {
    /// Wraps an engine-side failure message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// The engine's failure message.
    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Per-invocation view of the engine's port buffers.
///
/// The engine hands one of these to the process callback every period. Each
/// slice is exactly [`frames`](Self::frames) samples long and is only valid
/// for the duration of the invocation.
///
/// Implementations may panic when handed a [`PortHandle`] they did not mint;
/// the client only ever passes back handles it got from
/// [`AudioEngine::register_port`].
pub trait PortIo {
    /// Frames in this period.
    fn frames(&self) -> usize;

    /// Captured samples of one registered input port.
    fn input(&self, port: PortHandle) -> &[f32];

    /// Writable playback buffer of one registered output port.
    fn output(&mut self, port: PortHandle) -> &mut [f32];
}

/// Per-period process callback signature.
///
/// Called by the engine on its real-time thread, once per period.
///
/// ## Real-Time Safety
///
/// Implementations must not allocate, lock, block, or perform I/O. The
/// callback assembled by this crate communicates exclusively through
/// bounded lock-free channels and one atomic flag.
pub type ProcessCallback = Box<dyn FnMut(&mut dyn PortIo) + Send>;

/// Sample-rate notification signature; receives the new rate in Hz.
///
/// Notifications run on an engine-owned non-real-time thread.
pub type SampleRateCallback = Box<dyn FnMut(u32) + Send>;

/// Parameterless notification signature (graph reorder, port registration,
/// shutdown).
///
/// Notifications run on an engine-owned non-real-time thread.
pub type NotifyCallback = Box<dyn FnMut() + Send>;

/// The callback bundle a client hands to [`AudioEngine::open`].
///
/// The engine owns these for the lifetime of the session: the process
/// callback is invoked only between `activate` and `deactivate`, the
/// notification callbacks whenever their event occurs while the session is
/// open.
pub struct EngineCallbacks {
    /// Invoked once per period on the real-time thread while active.
    pub process: ProcessCallback,
    /// The engine's sample rate changed.
    pub on_sample_rate_change: SampleRateCallback,
    /// The engine graph's process order changed.
    pub on_graph_reorder: NotifyCallback,
    /// A port appeared in or vanished from the engine graph.
    pub on_port_registration: NotifyCallback,
    /// The engine is shutting this session down.
    pub on_shutdown: NotifyCallback,
}

impl std::fmt::Debug for EngineCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineCallbacks").finish_non_exhaustive()
    }
}

/// Pluggable audio engine trait.
///
/// Abstracts over the external audio server: session lifecycle, port
/// registration, graph queries and edits, and the clocking facts
/// ([`buffer_size`](Self::buffer_size), [`sample_rate`](Self::sample_rate)).
///
/// ## Object Safety
///
/// This trait is object-safe; the client stores a `Box<dyn AudioEngine>`.
/// All callbacks are boxed closures and all port identities are opaque
/// [`PortHandle`] tokens.
///
/// ## Contract
///
/// - `open` registers every callback up front; the engine must not invoke
///   the process callback before `activate` or after `deactivate`.
/// - Port names in graph operations are full names (`client:port`).
/// - `close` must stop callback delivery and release every port the session
///   registered. Dropping the callbacks on close is what unblocks an
///   application waiting on the exchange.
///
/// ## Implementing an Engine
///
/// ```rust,ignore
/// use puente_client::{AudioEngine, EngineCallbacks, EngineError};
/// use puente_client::{PortFlags, PortHandle};
///
/// struct ServerGlue { /* ... */ }
///
/// impl AudioEngine for ServerGlue {
///     fn name(&self) -> &str { "server" }
///
///     fn open(&mut self, client_name: &str, callbacks: EngineCallbacks)
///         -> Result<(), EngineError>
///     {
///         // Hand the callbacks to the server's client object
///         todo!()
///     }
///
///     // ... remaining delegations ...
/// #   fn close(&mut self) -> Result<(), EngineError> { todo!() }
/// #   fn register_port(&mut self, _: &str, _: PortFlags) -> Result<PortHandle, EngineError> { todo!() }
/// #   fn activate(&mut self) -> Result<(), EngineError> { todo!() }
/// #   fn deactivate(&mut self) -> Result<(), EngineError> { todo!() }
/// #   fn connect_ports(&mut self, _: &str, _: &str) -> Result<(), EngineError> { todo!() }
/// #   fn disconnect_ports(&mut self, _: &str, _: &str) -> Result<(), EngineError> { todo!() }
/// #   fn port_names(&self) -> Result<Vec<String>, EngineError> { todo!() }
/// #   fn port_flags(&self, _: &str) -> Result<PortFlags, EngineError> { todo!() }
/// #   fn port_connections(&self, _: &str) -> Result<Vec<String>, EngineError> { todo!() }
/// #   fn owns_port(&self, _: &str) -> Result<bool, EngineError> { todo!() }
/// #   fn buffer_size(&self) -> u32 { 128 }
/// #   fn sample_rate(&self) -> u32 { 48000 }
/// }
/// ```
pub trait AudioEngine: Send {
    /// Human-readable name of this engine (e.g., "jack", "pipewire", "mock").
    fn name(&self) -> &str;

    /// Opens a named client session and registers every callback.
    fn open(&mut self, client_name: &str, callbacks: EngineCallbacks) -> Result<(), EngineError>;

    /// Closes the session, stopping callback delivery and dropping the
    /// callbacks.
    fn close(&mut self) -> Result<(), EngineError>;

    /// Creates a port owned by this session; `name` is the short name.
    fn register_port(&mut self, name: &str, flags: PortFlags) -> Result<PortHandle, EngineError>;

    /// Starts per-period invocation of the process callback.
    fn activate(&mut self) -> Result<(), EngineError>;

    /// Stops per-period invocation of the process callback.
    fn deactivate(&mut self) -> Result<(), EngineError>;

    /// Routes `source` (an output port) into `destination` (an input port).
    fn connect_ports(&mut self, source: &str, destination: &str) -> Result<(), EngineError>;

    /// Removes the `source` → `destination` route.
    fn disconnect_ports(&mut self, source: &str, destination: &str) -> Result<(), EngineError>;

    /// Full names of every port in the engine graph, not just this client's.
    fn port_names(&self) -> Result<Vec<String>, EngineError>;

    /// Flags of the named port.
    fn port_flags(&self, name: &str) -> Result<PortFlags, EngineError>;

    /// Full names of every port connected to the named port.
    fn port_connections(&self, name: &str) -> Result<Vec<String>, EngineError>;

    /// `true` if the named port belongs to this session.
    fn owns_port(&self, name: &str) -> Result<bool, EngineError>;

    /// Frames per period. Fixed for the lifetime of a session.
    fn buffer_size(&self) -> u32;

    /// Current sample rate in Hz.
    fn sample_rate(&self) -> u32;
}

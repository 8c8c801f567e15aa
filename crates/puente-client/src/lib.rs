//! Block-based client sessions against an external audio engine.
//!
//! The engine runs a real-time callback once per period; the application
//! wants to sit in an ordinary loop and read or write whole blocks of
//! audio. This crate bridges the two without ever sharing sample memory:
//! each side works on its own block generation and full blocks travel
//! through bounded channels, one block in flight per direction.
//!
//! [`Client`] owns the session: it attaches to an engine through the
//! [`AudioEngine`] trait, registers ports, activates the callback, and then
//! [`exchange`](Client::exchange)s one block per period. The exchange is
//! the rate-matching point: it blocks until the engine has captured the
//! period's input, so the application loop runs at the engine's pace.
//!
//! Engine notifications (graph reorders, port churn, shutdown) latch into
//! sticky flags read with [`poll_events`](Client::poll_events); nothing is
//! delivered asynchronously to the application thread.
//!
//! [`MockEngine`] is a full in-process engine for tests and examples, with
//! a controller that stands in for the audio server.
//!
//! # Example
//!
//! A capture loop over two input ports:
//!
//! ```no_run
//! use puente_client::{Client, Error, MockEngine, MockEngineConfig, PortFlags, SampleMatrix};
//!
//! fn main() -> puente_client::Result<()> {
//!     let engine = MockEngine::new(MockEngineConfig::default());
//!     let mut client = Client::new(Box::new(engine));
//!     client.attach("recorder")?;
//!     client.register_port("in_l", PortFlags::INPUT)?;
//!     client.register_port("in_r", PortFlags::INPUT)?;
//!     client.activate()?;
//!
//!     let frames = client.buffer_size()? as usize;
//!     let silence = SampleMatrix::zeroed(0, 0);
//!     let mut block = SampleMatrix::zeroed(2, frames);
//!     for _ in 0..64 {
//!         match client.exchange(&silence, &mut block) {
//!             Ok(()) => { /* hand `block` to the recorder */ }
//!             // The engine outran us; the block is stale, skip it.
//!             Err(Error::InputDesync) => continue,
//!             Err(err) => return Err(err),
//!         }
//!     }
//!     client.detach();
//!     Ok(())
//! }
//! ```

mod client;
mod engine;
mod mock;
mod process;

// Re-export main types at crate root
pub use client::{Client, ClientState, HangupSignal};
pub use engine::{
    AudioEngine, EngineCallbacks, EngineError, NotifyCallback, PortIo, ProcessCallback,
    SampleRateCallback,
};
pub use mock::{MockController, MockEngine, MockEngineConfig};
pub use puente_core::{
    Direction, EventFlags, MAX_PORTS_PER_DIRECTION, PortFlags, PortHandle, SampleMatrix,
};

/// Errors reported by [`Client`] operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The operation is not legal in the client's current lifecycle state,
    /// or its arguments break a session rule (missing direction flag, port
    /// table full).
    #[error("usage error: {0}")]
    Usage(String),

    /// The operation needs a live engine connection and there is none:
    /// the client is detached, the engine shut the session down, or a
    /// hangup was raised.
    #[error("not connected to an audio engine")]
    NotConnected,

    /// The engine rejected a delegated call.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// A matrix handed to [`Client::exchange`] has the wrong shape.
    #[error("validation error: {0}")]
    Validation(String),

    /// The engine's last capture block never made it across: the exchange
    /// loop fell behind and the input just delivered is stale.
    #[error("input data stream desynchronized")]
    InputDesync,

    /// This period's output block could not be handed to the engine: the
    /// previous one is still in flight.
    #[error("output data stream desynchronized")]
    OutputDesync,
}

/// Convenience alias for client results.
pub type Result<T> = std::result::Result<T, Error>;

//! Puente Core - engine-agnostic primitives for real-time block exchange
//!
//! This crate provides the building blocks for moving fixed-size sample
//! blocks between a hard-real-time audio callback and a non-real-time
//! application thread, one block per engine period, with no shared mutable
//! sample memory and no locks on the real-time side.
//!
//! # Core Abstractions
//!
//! ## Block Memory
//!
//! - [`BlockLayout`] - channel-major, frame-minor geometry of one block
//! - [`BlockBuffer`] - one flat zero-initialized staging generation
//! - [`SampleMatrix`] - the row-major application-facing view
//! - [`gather_block`] / [`scatter_block`] - the per-direction strided copies
//!
//! ## Transport
//!
//! - [`block_channel`] - bounded channel pair sized to exactly one block
//! - [`BlockSender`] / [`BlockReceiver`] - whole-block all-or-nothing
//!   endpoints; the receiver also offers a blocking take
//! - [`SyncFlag`] - the producer's per-period "a full block crossed" signal
//!
//! ## Bookkeeping
//!
//! - [`PortRegistry`] - per-direction port tables with a hard cap of
//!   [`MAX_PORTS_PER_DIRECTION`] ports each
//! - [`PortFlags`] / [`PortHandle`] / [`Direction`] - port vocabulary
//! - [`EventLatch`] / [`EventFlags`] - sticky engine notifications with
//!   poll-and-reset draining
//!
//! # Threading Model
//!
//! Every type here assumes exactly two parties per direction: one real-time
//! producer and one application-side consumer (or the reverse). The channel
//! endpoints are not clonable and the all-or-nothing transfer guarantees
//! lean on that exclusivity; see [`exchange`] for the contract.
//!
//! # Design Principles
//!
//! - **Wait-free producer**: the real-time side never blocks, allocates, or
//!   returns errors; shortfalls surface through [`SyncFlag`]
//! - **Single block in flight**: transport capacity equals one block, so a
//!   slow consumer drops periods instead of buffering latency
//! - **No shared sample memory**: each side owns its staging generation;
//!   samples only cross inside channel messages

pub mod block;
pub mod events;
pub mod exchange;
pub mod matrix;
pub mod port;

// Re-export main types at crate root
pub use block::{BlockBuffer, BlockLayout, gather_block, scatter_block};
pub use events::{EventFlags, EventLatch};
pub use exchange::{BlockReceiver, BlockSender, ChannelClosed, SyncFlag, block_channel};
pub use matrix::SampleMatrix;
pub use port::{
    Direction, DirectionFull, MAX_PORTS_PER_DIRECTION, PortFlags, PortHandle, PortRegistry,
    RegisteredPort,
};

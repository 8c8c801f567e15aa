//! Real-time side of the exchange: the per-period process callback.
//!
//! The callback owns all engine-side exchange state ([`RtState`]) and
//! receives replacements through a mailbox channel whenever the client
//! rebuilds the geometry (port registration happens only while inactive, so
//! a swap is always observed on the first period of an activation).
//! Replaced state is pushed into a retire channel and freed later on the
//! application thread.
//!
//! Per period, in order:
//!
//! 1. drain the mailbox, installing the newest state,
//! 2. gather every input port into the capture generation,
//! 3. offer the capture block to the application (non-blocking) and record
//!    the outcome in the sync flag,
//! 4. take an application block into the playback generation if one is
//!    queued (non-blocking),
//! 5. scatter the playback generation to the output ports, but only when
//!    step 4 delivered a fresh block.
//!
//! Skipping the scatter on a shortfall is the underrun policy: the output
//! ports keep whatever they already held, so stale data persists instead of
//! being replaced by silence. Nothing on this path blocks, allocates,
//! errors, or logs.

use crossbeam_channel::{Receiver, Sender};
use puente_core::{BlockBuffer, BlockReceiver, BlockSender, PortHandle, SyncFlag};

use crate::engine::{PortIo, ProcessCallback};

/// Everything the process callback needs for one exchange geometry.
///
/// Built by the client at registration time, shipped through the mailbox,
/// owned by the callback until replaced.
pub(crate) struct RtState {
    /// Frames per period the geometry was sized for.
    pub(crate) frames: usize,
    /// Input port handles in channel order.
    pub(crate) input_handles: Vec<PortHandle>,
    /// Output port handles in channel order.
    pub(crate) output_handles: Vec<PortHandle>,
    /// Engine-side input generation (gathered captures).
    pub(crate) capture: BlockBuffer,
    /// Engine-side output generation (received playback).
    pub(crate) playback: BlockBuffer,
    /// Producer endpoint toward the application.
    pub(crate) to_app: BlockSender,
    /// Consumer endpoint for application output blocks.
    pub(crate) from_app: BlockReceiver,
    /// Outcome flag for the per-period capture send.
    pub(crate) sync: SyncFlag,
}

impl RtState {
    fn run_period(&mut self, io: &mut dyn PortIo) {
        let frames = self.frames;
        // Geometry is fixed per session; a mismatching period cannot be
        // exchanged safely, so it is skipped outright.
        if io.frames() != frames {
            return;
        }

        for (c, &handle) in self.input_handles.iter().enumerate() {
            self.capture
                .channel_mut(c)
                .copy_from_slice(&io.input(handle)[..frames]);
        }

        let sent = self.to_app.try_send_block(self.capture.as_slice());
        self.sync.set(sent);

        // On a shortfall the output ports are left alone: stale contents
        // persist instead of being overwritten with silence.
        if self.from_app.try_recv_block(self.playback.as_mut_slice()) {
            for (c, &handle) in self.output_handles.iter().enumerate() {
                io.output(handle)[..frames].copy_from_slice(self.playback.channel(c));
            }
        }
    }
}

/// Assembles the boxed per-period callback around a state mailbox.
///
/// The callback is inert until the first [`RtState`] arrives. Replaced
/// states go out through `retired_tx`; if that queue is ever full the state
/// is dropped in place, which only happens if the application stopped
/// draining retirements.
pub(crate) fn process_callback(
    state_rx: Receiver<RtState>,
    retired_tx: Sender<RtState>,
) -> ProcessCallback {
    let mut current: Option<RtState> = None;
    Box::new(move |io| {
        while let Ok(next) = state_rx.try_recv() {
            if let Some(old) = current.replace(next) {
                let _ = retired_tx.try_send(old);
            }
        }
        if let Some(state) = current.as_mut() {
            state.run_period(io);
        }
    })
}

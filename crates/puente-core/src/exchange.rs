//! Bounded single-block transport between the engine callback and the
//! application thread.
//!
//! Each direction gets one channel pair from [`block_channel`]. The
//! underlying transport is a bounded `crossbeam_channel` of `f32` whose
//! capacity equals one block's sample count, so at most one block is ever in
//! flight per direction. The wrappers impose *message atomicity* on top:
//! every operation transfers a whole block or nothing.
//!
//! # Usage contract
//!
//! The endpoints are single-producer / single-consumer. The all-or-nothing
//! guarantee of [`BlockSender::try_send_block`] relies on nobody else
//! draining free space between its capacity check and its pushes, and
//! [`BlockReceiver::try_recv_block`] relies on nobody else consuming after
//! its length check. Endpoints are deliberately not clonable.
//!
//! A zero-length block (a direction with no ports) crosses the channel as an
//! immediate no-op on both sides.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender};

/// The other half of a block channel was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("block channel closed")]
pub struct ChannelClosed;

/// Producer endpoint: offers whole blocks without blocking.
#[derive(Debug)]
pub struct BlockSender {
    tx: Sender<f32>,
    block_len: usize,
}

/// Consumer endpoint: takes whole blocks, non-blocking or blocking.
#[derive(Debug)]
pub struct BlockReceiver {
    rx: Receiver<f32>,
    block_len: usize,
}

/// Creates the channel pair for one direction.
///
/// `block_len` is the full block sample count (`channels × frames`) and
/// becomes the transport capacity, which is what limits the channel to a
/// single in-flight block.
pub fn block_channel(block_len: usize) -> (BlockSender, BlockReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(block_len);
    (
        BlockSender { tx, block_len },
        BlockReceiver { rx, block_len },
    )
}

impl BlockSender {
    /// Full block sample count this endpoint was sized for.
    #[inline]
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Offers one whole block without blocking.
    ///
    /// Returns `true` only if the entire block was accepted. `false` means
    /// nothing was transferred: either the previous block has not been
    /// collected yet, or the consumer side is gone. Never blocks and never
    /// allocates; safe to call from a real-time callback.
    pub fn try_send_block(&self, block: &[f32]) -> bool {
        debug_assert_eq!(block.len(), self.block_len);
        if block.is_empty() {
            return true;
        }
        // Single producer: the consumer only ever *frees* space, so a
        // successful capacity check cannot be invalidated mid-push.
        if self.block_len - self.tx.len() < block.len() {
            return false;
        }
        for &sample in block {
            if self.tx.try_send(sample).is_err() {
                return false;
            }
        }
        true
    }
}

impl BlockReceiver {
    /// Full block sample count this endpoint was sized for.
    #[inline]
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Takes one whole block without blocking.
    ///
    /// Returns `true` only if a full block was transferred into `block`.
    /// `false` means `block` is untouched: no complete block was queued.
    /// Never blocks and never allocates; safe to call from a real-time
    /// callback.
    pub fn try_recv_block(&self, block: &mut [f32]) -> bool {
        debug_assert_eq!(block.len(), self.block_len);
        if block.is_empty() {
            return true;
        }
        // Single consumer: queued length only grows under our feet, so the
        // length check guarantees the pops below all succeed.
        if self.rx.len() < block.len() {
            return false;
        }
        for slot in block.iter_mut() {
            match self.rx.try_recv() {
                Ok(sample) => *slot = sample,
                Err(_) => return false,
            }
        }
        true
    }

    /// Takes one whole block, blocking until the producer has sent it.
    ///
    /// This is the consumer's rate-matching point: the call parks until a
    /// full block has crossed, then returns. [`ChannelClosed`] means the
    /// producer endpoint was dropped; `block` may then hold a partial
    /// transfer and must be considered garbage.
    pub fn recv_block(&self, block: &mut [f32]) -> Result<(), ChannelClosed> {
        debug_assert_eq!(block.len(), self.block_len);
        for slot in block.iter_mut() {
            match self.rx.recv() {
                Ok(sample) => *slot = sample,
                Err(_) => return Err(ChannelClosed),
            }
        }
        Ok(())
    }
}

/// Shared indicator of whether the producer's last send moved a full block.
///
/// The engine callback writes it once per period; the application reads it
/// during the exchange and may observe a value one period stale.
#[derive(Debug, Clone, Default)]
pub struct SyncFlag(Arc<AtomicBool>);

impl SyncFlag {
    /// A fresh flag, starting desynchronized.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of the producer's last whole-block send.
    #[inline]
    pub fn set(&self, synced: bool) {
        self.0.store(synced, Ordering::Release);
    }

    /// `true` if the producer's last send transferred a full block.
    #[inline]
    pub fn is_synced(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Drops back to the desynchronized starting state.
    #[inline]
    pub fn reset(&self) {
        self.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn whole_block_or_nothing() {
        let (tx, rx) = block_channel(4);
        assert!(tx.try_send_block(&[1.0, 2.0, 3.0, 4.0]));
        // Capacity is one block: a second uncollected send must fail whole.
        assert!(!tx.try_send_block(&[5.0, 6.0, 7.0, 8.0]));

        let mut out = [0.0; 4];
        assert!(rx.try_recv_block(&mut out));
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);
        assert!(!rx.try_recv_block(&mut out));
    }

    #[test]
    fn send_succeeds_again_after_drain() {
        let (tx, rx) = block_channel(2);
        let mut out = [0.0; 2];
        assert!(tx.try_send_block(&[1.0, 2.0]));
        assert!(rx.try_recv_block(&mut out));
        assert!(tx.try_send_block(&[3.0, 4.0]));
        assert!(rx.try_recv_block(&mut out));
        assert_eq!(out, [3.0, 4.0]);
    }

    #[test]
    fn empty_blocks_are_no_ops() {
        let (tx, rx) = block_channel(0);
        assert!(tx.try_send_block(&[]));
        assert!(rx.try_recv_block(&mut []));
        assert_eq!(rx.recv_block(&mut []), Ok(()));
    }

    #[test]
    fn recv_block_waits_for_the_producer() {
        let (tx, rx) = block_channel(3);
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            assert!(tx.try_send_block(&[0.5, 0.25, 0.125]));
        });

        let mut out = [0.0; 3];
        rx.recv_block(&mut out).unwrap();
        assert_eq!(out, [0.5, 0.25, 0.125]);
        producer.join().unwrap();
    }

    #[test]
    fn dropped_producer_closes_the_channel() {
        let (tx, rx) = block_channel(2);
        drop(tx);
        let mut out = [0.0; 2];
        assert_eq!(rx.recv_block(&mut out), Err(ChannelClosed));
        assert!(!rx.try_recv_block(&mut out));
    }

    #[test]
    fn dropped_consumer_fails_sends() {
        let (tx, rx) = block_channel(2);
        drop(rx);
        assert!(!tx.try_send_block(&[1.0, 2.0]));
    }

    #[test]
    fn queued_block_survives_producer_drop() {
        let (tx, rx) = block_channel(2);
        assert!(tx.try_send_block(&[1.0, 2.0]));
        drop(tx);
        let mut out = [0.0; 2];
        assert_eq!(rx.recv_block(&mut out), Ok(()));
        assert_eq!(out, [1.0, 2.0]);
    }

    #[test]
    fn sync_flag_starts_down_and_is_shared() {
        let flag = SyncFlag::new();
        assert!(!flag.is_synced());

        let writer = flag.clone();
        writer.set(true);
        assert!(flag.is_synced());

        flag.reset();
        assert!(!writer.is_synced());
    }
}

//! Flat block storage and the channel-major copy routines.
//!
//! A *block* is one engine period's worth of samples for one direction,
//! stored as a single flat `f32` buffer. The layout is channel-major,
//! frame-minor: with `F` frames per block, sample `(c, j)` (channel `c`,
//! frame `j`) lives at offset `j + c * F`. Channel order is port
//! registration order.
//!
//! Exactly one copy routine exists per direction of travel:
//!
//! - [`gather_block`] packs a row-major [`SampleMatrix`] into a block
//!   (application output path),
//! - [`scatter_block`] unpacks a block into a row-major [`SampleMatrix`]
//!   (application input path).
//!
//! Because the matrix is contiguous row-major with rows == channels and
//! cols == frames, each routine is a per-channel strided copy with stride
//! `F` on both sides.

use crate::matrix::SampleMatrix;

/// Geometry of one block: channel count × frames per block.
///
/// # Example
///
/// ```rust
/// use puente_core::BlockLayout;
///
/// let layout = BlockLayout::new(3, 128);
/// assert_eq!(layout.len(), 384);
/// assert_eq!(layout.offset(0, 5), 5);
/// assert_eq!(layout.offset(2, 5), 5 + 2 * 128);
/// assert_eq!(layout.channel_range(1), 128..256);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    channels: usize,
    frames: usize,
}

impl BlockLayout {
    /// A layout for `channels` ports at `frames` frames per block.
    #[inline]
    pub const fn new(channels: usize, frames: usize) -> Self {
        Self { channels, frames }
    }

    /// Channel (port) count.
    #[inline]
    pub const fn channels(self) -> usize {
        self.channels
    }

    /// Frames per block.
    #[inline]
    pub const fn frames(self) -> usize {
        self.frames
    }

    /// Total samples in one block: `channels × frames`.
    #[inline]
    pub const fn len(self) -> usize {
        self.channels * self.frames
    }

    /// `true` when the block carries no samples (no ports, or no frames).
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Flat offset of sample `(channel, frame)`: `frame + channel × frames`.
    #[inline]
    pub const fn offset(self, channel: usize, frame: usize) -> usize {
        frame + channel * self.frames
    }

    /// Flat range holding all frames of `channel`.
    #[inline]
    pub const fn channel_range(self, channel: usize) -> core::ops::Range<usize> {
        channel * self.frames..(channel + 1) * self.frames
    }
}

/// One staging generation: a zero-initialized flat buffer with its layout.
///
/// Each direction owns two of these, one touched only by the engine
/// callback and one touched only by the application thread, so no sample
/// memory is ever shared across the thread boundary.
#[derive(Debug, Clone)]
pub struct BlockBuffer {
    layout: BlockLayout,
    data: Vec<f32>,
}

impl BlockBuffer {
    /// Allocates a silent block for `layout`.
    pub fn new(layout: BlockLayout) -> Self {
        Self {
            layout,
            data: vec![0.0; layout.len()],
        }
    }

    /// The geometry this buffer was sized for.
    #[inline]
    pub fn layout(&self) -> BlockLayout {
        self.layout
    }

    /// The whole block, channel-major.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// The whole block, channel-major, mutable.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Frames of one channel.
    #[inline]
    pub fn channel(&self, c: usize) -> &[f32] {
        &self.data[self.layout.channel_range(c)]
    }

    /// Frames of one channel, mutable.
    #[inline]
    pub fn channel_mut(&mut self, c: usize) -> &mut [f32] {
        let range = self.layout.channel_range(c);
        &mut self.data[range]
    }
}

/// Packs a row-major matrix into a channel-major block.
///
/// Row `c` of `matrix` becomes the samples at offsets
/// `c × F .. (c + 1) × F` of `block`, where `F` is the layout's frame count;
/// sample `(c, j)` therefore lands at `j + c × F`.
///
/// The matrix shape must equal the block layout (`rows == channels`,
/// `cols == frames`); callers validate shapes before reaching this point.
pub fn gather_block(matrix: &SampleMatrix, block: &mut BlockBuffer) {
    let layout = block.layout();
    debug_assert_eq!(matrix.rows(), layout.channels());
    debug_assert_eq!(matrix.cols(), layout.frames());
    for c in 0..layout.channels() {
        block.channel_mut(c).copy_from_slice(matrix.row(c));
    }
}

/// Unpacks a channel-major block into a row-major matrix.
///
/// The samples at offsets `c × F .. (c + 1) × F` of `block` become row `c`
/// of `matrix`; sample at flat offset `j + c × F` lands at `(c, j)`.
///
/// The matrix shape must equal the block layout (`rows == channels`,
/// `cols == frames`); callers validate shapes before reaching this point.
pub fn scatter_block(block: &BlockBuffer, matrix: &mut SampleMatrix) {
    let layout = block.layout();
    debug_assert_eq!(matrix.rows(), layout.channels());
    debug_assert_eq!(matrix.cols(), layout.frames());
    for c in 0..layout.channels() {
        matrix.row_mut(c).copy_from_slice(block.channel(c));
    }
}

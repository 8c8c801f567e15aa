//! Row-major sample matrix: the application-facing view of one block.
//!
//! One row per port (in registration order), one column per frame. This is
//! the shape the exchange call validates against the current port geometry;
//! the flat channel-major block form lives in [`block`](crate::block), and
//! the copy routines there translate between the two.

/// Two-dimensional `f32` sample storage, row-major and contiguous.
///
/// Rows are ports, columns are frames. A matrix with zero rows is legal and
/// stands for "this direction has no ports".
///
/// # Example
///
/// ```rust
/// use puente_core::SampleMatrix;
///
/// let mut m = SampleMatrix::zeroed(2, 4);
/// m.row_mut(1)[3] = 0.5;
/// assert_eq!(m.row(0), [0.0; 4]);
/// assert_eq!(m.row(1)[3], 0.5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl SampleMatrix {
    /// Allocates a zero-filled `rows × cols` matrix.
    pub fn zeroed(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Builds a matrix from per-row slices; every row must share one length.
    ///
    /// # Panics
    ///
    /// Panics if the rows differ in length.
    pub fn from_rows(rows: &[&[f32]]) -> Self {
        let cols = rows.first().map_or(0, |r| r.len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            assert_eq!(row.len(), cols, "all rows must have the same length");
            data.extend_from_slice(row);
        }
        Self {
            rows: rows.len(),
            cols,
            data,
        }
    }

    /// Number of rows (ports).
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (frames).
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Row `r` as a frame slice.
    #[inline]
    pub fn row(&self, r: usize) -> &[f32] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    /// Row `r` as a mutable frame slice.
    #[inline]
    pub fn row_mut(&mut self, r: usize) -> &mut [f32] {
        &mut self.data[r * self.cols..(r + 1) * self.cols]
    }

    /// The whole matrix as one flat row-major slice.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// The whole matrix as one flat mutable row-major slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Overwrites every sample with zero.
    pub fn fill_silence(&mut self) {
        self.data.fill(0.0);
    }
}

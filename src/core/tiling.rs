//! Row-block and tile decomposition for bounded-memory, parallel processing.
//!
//! Every per-pixel operation in this crate is independent of its neighbours, so a
//! block computed on its own is identical to the same region of a whole-raster
//! computation. Blocks are computed in parallel and written straight into disjoint
//! row ranges of a preallocated output.
use ndarray::{Array2, Axis};
use rayon::prelude::*;
use tracing::debug;

use crate::core::raster::Window;
use crate::error::Result;

/// Full-width row blocks of at most `block_rows` rows
pub fn row_blocks(rows: usize, cols: usize, block_rows: usize) -> Vec<Window> {
    let step = block_rows.max(1);
    (0..rows)
        .step_by(step)
        .map(|r| Window::new(r, 0, step.min(rows - r), cols))
        .collect()
}

/// Rectangular tiles of at most `tile_rows` x `tile_cols`, row-major
pub fn tiles(rows: usize, cols: usize, tile_rows: usize, tile_cols: usize) -> Vec<Window> {
    let tr = tile_rows.max(1);
    let tc = tile_cols.max(1);
    let mut out = Vec::new();
    for r in (0..rows).step_by(tr) {
        for c in (0..cols).step_by(tc) {
            out.push(Window::new(r, c, tr.min(rows - r), tc.min(cols - c)));
        }
    }
    out
}

/// Evaluate `f` on each block in parallel and write the results into one
/// `(rows, cols)` grid. `f` receives the block window and must return arrays of the
/// window's shape. Each block is written into its rows of the output as soon as it
/// is computed.
pub(crate) fn assemble_blocks<T, F>(
    rows: usize,
    cols: usize,
    block_rows: Option<usize>,
    fill: T,
    f: F,
) -> Result<(Array2<T>, Array2<bool>)>
where
    T: Copy + Send + Sync,
    F: Fn(&Window) -> Result<(Array2<T>, Array2<bool>)> + Sync,
{
    let step = block_rows.unwrap_or(rows).max(1);
    debug!(
        "processing {}x{} in {} block(s) of up to {} rows",
        rows,
        cols,
        rows.div_ceil(step),
        step
    );

    let mut data = Array2::from_elem((rows, cols), fill);
    let mut valid = Array2::from_elem((rows, cols), false);
    data.axis_chunks_iter_mut(Axis(0), step)
        .into_par_iter()
        .zip(valid.axis_chunks_iter_mut(Axis(0), step).into_par_iter())
        .enumerate()
        .try_for_each(|(i, (mut data_rows, mut valid_rows))| {
            let w = Window::new(i * step, 0, data_rows.nrows(), cols);
            let (block_data, block_valid) = f(&w)?;
            data_rows.assign(&block_data);
            valid_rows.assign(&block_valid);
            Ok::<(), crate::error::Error>(())
        })?;
    Ok((data, valid))
}

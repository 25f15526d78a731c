//! Difference rasters and thresholded change masks between two epochs.
use ndarray::{Array2, ArrayView2, Zip, s};
use tracing::{debug, info};

use crate::core::indices::IndexRaster;
use crate::core::params::validate_threshold;
use crate::core::raster::{Georeference, Raster};
use crate::core::tiling::assemble_blocks;
use crate::error::{Error, Result};
use crate::types::{ChangeClass, ChangeMode, SpectralIndex};

/// `after - before`, invalid wherever either input is invalid
#[derive(Debug, Clone, PartialEq)]
pub struct DiffRaster {
    pub index: SpectralIndex,
    pub raster: Raster<f64>,
}

/// Per-pixel change classes plus the mode and threshold that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeMask {
    pub mode: ChangeMode,
    pub threshold: f64,
    pub raster: Raster<ChangeClass>,
}

impl ChangeMask {
    pub fn georef(&self) -> &Georeference {
        self.raster.georef()
    }

    pub fn class_at(&self, row: usize, col: usize) -> Option<ChangeClass> {
        self.raster.data().get((row, col)).copied()
    }

    /// Mask as the on-disk u8 codes
    pub fn codes(&self) -> Array2<u8> {
        self.raster.data().mapv(ChangeClass::code)
    }
}

#[derive(Debug, Clone)]
pub struct ChangeResult {
    pub diff: DiffRaster,
    pub mask: ChangeMask,
}

/// Classify one valid difference value. Both bounds are inclusive.
#[inline]
pub fn classify(diff: f64, threshold: f64, mode: ChangeMode) -> ChangeClass {
    match mode {
        ChangeMode::Binary => {
            if diff.abs() >= threshold {
                ChangeClass::Changed
            } else {
                ChangeClass::Unchanged
            }
        }
        ChangeMode::Signed => {
            if diff >= threshold {
                ChangeClass::Increase
            } else if diff <= -threshold {
                ChangeClass::Decrease
            } else {
                ChangeClass::Unchanged
            }
        }
    }
}

fn check_inputs(before: &IndexRaster, after: &IndexRaster, threshold: f64) -> Result<()> {
    if before.index() != after.index() {
        return Err(Error::IndexMismatch {
            left: before.index(),
            right: after.index(),
        });
    }
    before
        .georef()
        .ensure_matches(after.georef(), "before", "after")?;
    validate_threshold(threshold)
}

pub fn detect_change(
    before: &IndexRaster,
    after: &IndexRaster,
    threshold: f64,
    mode: ChangeMode,
) -> Result<ChangeResult> {
    detect(before, after, threshold, mode, None)
}

/// Row-block variant; output is independent of `block_rows`
pub fn detect_change_tiled(
    before: &IndexRaster,
    after: &IndexRaster,
    threshold: f64,
    mode: ChangeMode,
    block_rows: usize,
) -> Result<ChangeResult> {
    detect(before, after, threshold, mode, Some(block_rows))
}

pub(crate) fn detect(
    before: &IndexRaster,
    after: &IndexRaster,
    threshold: f64,
    mode: ChangeMode,
    block_rows: Option<usize>,
) -> Result<ChangeResult> {
    check_inputs(before, after, threshold)?;
    let index = before.index();
    let (rows, cols) = before.raster().shape();
    info!(
        "Detecting {} change ({} mode, threshold {})",
        index, mode, threshold
    );

    let a = before.raster();
    let b = after.raster();
    let views: [(ArrayView2<f64>, ArrayView2<bool>); 2] = [
        (a.data().view(), a.valid_mask().view()),
        (b.data().view(), b.valid_mask().view()),
    ];

    let (diff, valid) = assemble_blocks(rows, cols, block_rows, f64::NAN, |w| {
        let sl = s![w.row_off..w.row_off + w.rows, w.col_off..w.col_off + w.cols];
        let (ad, av) = (views[0].0.slice(sl), views[0].1.slice(sl));
        let (bd, bv) = (views[1].0.slice(sl), views[1].1.slice(sl));
        let mut out = Array2::from_elem((w.rows, w.cols), f64::NAN);
        let mut ok = Array2::from_elem((w.rows, w.cols), false);
        Zip::from(&mut out)
            .and(&mut ok)
            .and(&ad)
            .and(&av)
            .and(&bd)
            .and(&bv)
            .for_each(|o, k, &x, &xv, &y, &yv| {
                if xv && yv {
                    let d = y - x;
                    if d.is_finite() {
                        *o = d;
                        *k = true;
                    }
                }
            });
        Ok((out, ok))
    })?;

    let mut classes = Array2::from_elem((rows, cols), ChangeClass::Invalid);
    Zip::from(&mut classes)
        .and(&diff)
        .and(&valid)
        .par_for_each(|c, &d, &v| {
            if v {
                *c = classify(d, threshold, mode);
            }
        });

    let georef = before.georef().clone();
    let mask_valid = valid.clone();
    let diff = Raster::new(diff, valid, georef.clone())?;
    debug!(
        "{} diff: {} of {} pixels valid",
        index,
        diff.valid_count(),
        diff.len()
    );
    Ok(ChangeResult {
        diff: DiffRaster { index, raster: diff },
        mask: ChangeMask {
            mode,
            threshold,
            raster: Raster::new(classes, mask_valid, georef)?,
        },
    })
}

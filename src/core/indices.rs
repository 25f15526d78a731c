//! Spectral index computation.
//!
//! Every formula is a pure per-pixel function. A pixel is invalid in the output
//! when any band it reads is invalid, when the quality mask rejects it, when a
//! denominator is exactly zero, or when the arithmetic is otherwise undefined.
//! NaN is never produced for a pixel marked valid.
use ndarray::{Array2, ArrayView2, s};
use tracing::{debug, info};

use crate::core::params::IndexParams;
use crate::core::quality::DataQualityWarning;
use crate::core::raster::{Georeference, Raster};
use crate::core::scene::Scene;
use crate::core::tiling::assemble_blocks;
use crate::error::Result;
use crate::types::{BandRole, SpectralIndex};

/// Index values of one epoch. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRaster {
    index: SpectralIndex,
    raster: Raster<f64>,
}

impl IndexRaster {
    pub fn new(index: SpectralIndex, raster: Raster<f64>) -> Self {
        Self { index, raster }
    }

    pub fn index(&self) -> SpectralIndex {
        self.index
    }

    pub fn raster(&self) -> &Raster<f64> {
        &self.raster
    }

    pub fn georef(&self) -> &Georeference {
        self.raster.georef()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.raster.get(row, col)
    }
}

/// An index raster plus whatever data-quality findings it raised
#[derive(Debug, Clone)]
pub struct IndexOutput {
    pub raster: IndexRaster,
    pub warnings: Vec<DataQualityWarning>,
}

/// Reflectances of one pixel; roles not read by the formula stay NaN
#[derive(Debug, Clone, Copy)]
struct Pixel {
    blue: f64,
    green: f64,
    red: f64,
    nir: f64,
    swir1: f64,
    swir2: f64,
}

impl Pixel {
    fn empty() -> Self {
        Self {
            blue: f64::NAN,
            green: f64::NAN,
            red: f64::NAN,
            nir: f64::NAN,
            swir1: f64::NAN,
            swir2: f64::NAN,
        }
    }

    fn set(&mut self, role: BandRole, v: f64) {
        match role {
            BandRole::Blue => self.blue = v,
            BandRole::Green => self.green = v,
            BandRole::Red => self.red = v,
            BandRole::Nir => self.nir = v,
            BandRole::Swir1 => self.swir1 = v,
            BandRole::Swir2 => self.swir2 = v,
        }
    }
}

/// `(a - b) / (a + b)`, undefined when the sum is exactly zero
#[inline]
fn normalized_difference(a: f64, b: f64) -> Option<f64> {
    ratio(a - b, a + b)
}

#[inline]
fn ratio(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        return None;
    }
    let v = num / den;
    v.is_finite().then_some(v)
}

fn evaluate(index: SpectralIndex, p: &Pixel, params: &IndexParams) -> Option<f64> {
    match index {
        SpectralIndex::Ndvi => normalized_difference(p.nir, p.red),
        SpectralIndex::Ndwi => normalized_difference(p.green, p.nir),
        SpectralIndex::Ndbi => normalized_difference(p.swir1, p.nir),
        SpectralIndex::Savi => {
            let l = params.soil_brightness;
            ratio(p.nir - p.red, p.nir + p.red + l).map(|v| v * (1.0 + l))
        }
        SpectralIndex::Msavi => {
            let a = 2.0 * p.nir + 1.0;
            let radicand = a * a - 8.0 * (p.nir - p.red);
            if radicand < 0.0 {
                return None;
            }
            let v = (a - radicand.sqrt()) / 2.0;
            v.is_finite().then_some(v)
        }
        SpectralIndex::Evi => {
            let e = &params.evi;
            ratio(
                p.nir - p.red,
                p.nir + e.c1 * p.red - e.c2 * p.blue + e.l,
            )
            .map(|v| e.gain * v)
        }
        SpectralIndex::Bsi => {
            let a = p.swir1 + p.red;
            let b = p.nir + p.blue;
            normalized_difference(a, b)
        }
    }
}

/// Computes spectral indices over scenes, optionally in row blocks.
#[derive(Debug, Clone, Default)]
pub struct IndexEngine {
    params: IndexParams,
    block_rows: Option<usize>,
}

impl IndexEngine {
    pub fn new(params: IndexParams) -> Self {
        Self {
            params,
            block_rows: None,
        }
    }

    /// Process in blocks of `rows` rows (`None` = whole raster)
    pub fn with_block_rows(mut self, rows: Option<usize>) -> Self {
        self.block_rows = rows;
        self
    }

    pub fn params(&self) -> &IndexParams {
        &self.params
    }

    pub fn compute(&self, index: SpectralIndex, scene: &Scene) -> Result<IndexOutput> {
        self.compute_for(index, scene, "scene")
    }

    /// Compute `index`, labelling any warnings with `context` (e.g. the epoch name)
    pub fn compute_for(
        &self,
        index: SpectralIndex,
        scene: &Scene,
        context: &str,
    ) -> Result<IndexOutput> {
        scene.ensure_bands_for(index)?;
        let roles = index.required_bands();
        let (rows, cols) = scene.shape();
        info!("Computing {} for {} ({}x{})", index, context, rows, cols);

        let mut inputs: Vec<(BandRole, ArrayView2<f64>, ArrayView2<bool>)> =
            Vec::with_capacity(roles.len());
        for role in roles {
            let band = scene.band(*role)?;
            inputs.push((*role, band.raster.data().view(), band.raster.valid_mask().view()));
        }
        let quality = scene.quality_mask().map(|q| q.view());
        let params = self.params;

        let (mut data, valid) = assemble_blocks(rows, cols, self.block_rows, f64::NAN, |w| {
            let sl = s![w.row_off..w.row_off + w.rows, w.col_off..w.col_off + w.cols];
            let views: Vec<_> = inputs
                .iter()
                .map(|(role, d, v)| (*role, d.slice(sl), v.slice(sl)))
                .collect();
            let q = quality.as_ref().map(|q| q.slice(sl));

            let mut out = Array2::from_elem((w.rows, w.cols), f64::NAN);
            let mut ok = Array2::from_elem((w.rows, w.cols), false);
            for r in 0..w.rows {
                for c in 0..w.cols {
                    if let Some(q) = &q {
                        if !q[[r, c]] {
                            continue;
                        }
                    }
                    let mut px = Pixel::empty();
                    let mut usable = true;
                    for (role, d, v) in &views {
                        if !v[[r, c]] {
                            usable = false;
                            break;
                        }
                        px.set(*role, d[[r, c]]);
                    }
                    if !usable {
                        continue;
                    }
                    if let Some(value) = evaluate(index, &px, &params) {
                        out[[r, c]] = value;
                        ok[[r, c]] = true;
                    }
                }
            }
            Ok((out, ok))
        })?;

        let mut warnings = Vec::new();
        if let Some((lo, hi)) = index.bounds() {
            let (count, max_overshoot) = clamp_to_bounds(&mut data, &valid, lo, hi);
            if count > 0 {
                warnings.push(
                    DataQualityWarning::ClampedValues {
                        index,
                        context: context.to_string(),
                        count,
                        max_overshoot,
                    }
                    .raise(),
                );
            }
        }

        let raster = Raster::new(data, valid, scene.georef().clone())?;
        debug!(
            "{} for {}: {} of {} pixels valid",
            index,
            context,
            raster.valid_count(),
            raster.len()
        );
        Ok(IndexOutput {
            raster: IndexRaster::new(index, raster),
            warnings,
        })
    }
}

/// Clamp valid values into [lo, hi]; returns how many were outside and the worst
/// overshoot.
fn clamp_to_bounds(data: &mut Array2<f64>, valid: &Array2<bool>, lo: f64, hi: f64) -> (usize, f64) {
    let mut count = 0;
    let mut worst = 0.0_f64;
    for (v, ok) in data.iter_mut().zip(valid.iter()) {
        if !*ok {
            continue;
        }
        let over = if *v > hi {
            *v - hi
        } else if *v < lo {
            lo - *v
        } else {
            continue;
        };
        count += 1;
        worst = worst.max(over);
        *v = v.clamp(lo, hi);
    }
    (count, worst)
}

/// Whole-raster convenience wrapper around [`IndexEngine`]
pub fn compute_index(
    index: SpectralIndex,
    scene: &Scene,
    params: &IndexParams,
) -> Result<IndexOutput> {
    IndexEngine::new(*params).compute(index, scene)
}

/// Row-block variant; identical output for any `block_rows`
pub fn compute_index_tiled(
    index: SpectralIndex,
    scene: &Scene,
    params: &IndexParams,
    block_rows: usize,
) -> Result<IndexOutput> {
    IndexEngine::new(*params)
        .with_block_rows(Some(block_rows))
        .compute(index, scene)
}

//! Colour lookup tables and value stretches for quicklooks.
//!
//! Colormaps are 256-entry RGB lookup tables built once from a few anchor colours,
//! so colouring a pixel is a single table lookup.
use crate::core::raster::Raster;
use crate::types::{ChangeClass, SpectralIndex};

/// Colour of invalid pixels
pub const NODATA_RGB: [u8; 3] = [0, 0, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    /// Red-yellow-green, for vegetation indices
    RdYlGn,
    /// White to dark blue, for water
    Blues,
    /// Blue-white-red diverging, for differences and other indices
    Bwr,
}

impl Colormap {
    pub fn for_index(index: SpectralIndex) -> Colormap {
        match index {
            SpectralIndex::Ndvi | SpectralIndex::Savi | SpectralIndex::Msavi | SpectralIndex::Evi => {
                Colormap::RdYlGn
            }
            SpectralIndex::Ndwi => Colormap::Blues,
            SpectralIndex::Ndbi | SpectralIndex::Bsi => Colormap::Bwr,
        }
    }

    fn anchors(&self) -> &'static [[u8; 3]] {
        match self {
            Colormap::RdYlGn => &[
                [165, 0, 38],
                [244, 109, 67],
                [254, 224, 139],
                [217, 239, 139],
                [102, 189, 99],
                [0, 104, 55],
            ],
            Colormap::Blues => &[[247, 251, 255], [158, 202, 225], [66, 146, 198], [8, 48, 107]],
            Colormap::Bwr => &[[0, 0, 255], [255, 255, 255], [255, 0, 0]],
        }
    }

    /// 256-entry lookup table, linearly interpolated between anchors
    pub fn lut(&self) -> [[u8; 3]; 256] {
        let anchors = self.anchors();
        let segments = (anchors.len() - 1) as f32;
        let mut lut = [[0u8; 3]; 256];
        for (i, entry) in lut.iter_mut().enumerate() {
            let t = i as f32 / 255.0 * segments;
            let k = (t.floor() as usize).min(anchors.len() - 2);
            let f = t - k as f32;
            for ch in 0..3 {
                let a = anchors[k][ch] as f32;
                let b = anchors[k + 1][ch] as f32;
                entry[ch] = (a + (b - a) * f).round().clamp(0.0, 255.0) as u8;
            }
        }
        lut
    }
}

/// Linear value range mapped onto the colormap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stretch {
    pub min: f64,
    pub max: f64,
}

impl Stretch {
    /// Fixed range for bounded indices, 2nd-98th percentile otherwise
    pub fn for_index(index: SpectralIndex, raster: &Raster<f64>) -> Stretch {
        if let Some((lo, hi)) = index.bounds() {
            return Stretch { min: lo, max: hi };
        }
        let values = sorted_valid(raster, |v| v);
        match (percentile(&values, 2.0), percentile(&values, 98.0)) {
            (Some(min), Some(max)) if max > min => Stretch { min, max },
            (Some(v), Some(_)) => Stretch {
                min: v - 0.5,
                max: v + 0.5,
            },
            _ => Stretch { min: -1.0, max: 1.0 },
        }
    }

    /// Symmetric range at the 98th percentile of |diff| so zero stays white
    pub fn symmetric(raster: &Raster<f64>) -> Stretch {
        let values = sorted_valid(raster, f64::abs);
        let m = percentile(&values, 98.0)
            .filter(|m| *m > 0.0)
            .unwrap_or(1.0);
        Stretch { min: -m, max: m }
    }

    #[inline]
    pub fn to_u8(&self, v: f64) -> u8 {
        let t = (v - self.min) / (self.max - self.min);
        (t.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

fn sorted_valid(raster: &Raster<f64>, f: impl Fn(f64) -> f64) -> Vec<f64> {
    let mut values: Vec<f64> = raster
        .data()
        .iter()
        .zip(raster.valid_mask().iter())
        .filter(|(_, ok)| **ok)
        .map(|(v, _)| f(*v))
        .collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values
}

/// Nearest-rank percentile of sorted values
fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted.get(rank.min(sorted.len() - 1)).copied()
}

/// Interleaved RGB bytes of a continuous raster
pub fn colorize(raster: &Raster<f64>, colormap: Colormap, stretch: Stretch) -> Vec<u8> {
    let lut = colormap.lut();
    let mut rgb = Vec::with_capacity(raster.len() * 3);
    for (v, ok) in raster.data().iter().zip(raster.valid_mask().iter()) {
        let px = if *ok {
            lut[stretch.to_u8(*v) as usize]
        } else {
            NODATA_RGB
        };
        rgb.extend_from_slice(&px);
    }
    rgb
}

pub fn class_color(class: ChangeClass) -> [u8; 3] {
    match class {
        ChangeClass::Invalid => NODATA_RGB,
        ChangeClass::Unchanged => [200, 200, 200],
        ChangeClass::Changed => [230, 85, 13],
        ChangeClass::Increase => [26, 152, 80],
        ChangeClass::Decrease => [215, 48, 39],
    }
}

/// Interleaved RGB bytes of a change mask
pub fn colorize_mask(mask: &Raster<ChangeClass>) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(mask.len() * 3);
    for class in mask.data().iter() {
        rgb.extend_from_slice(&class_color(*class));
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scene::test_support::utm_georef;
    use ndarray::Array2;

    #[test]
    fn test_lut_endpoints_match_anchors() {
        let lut = Colormap::Bwr.lut();
        assert_eq!(lut[0], [0, 0, 255]);
        assert_eq!(lut[255], [255, 0, 0]);
        let mid = lut[128];
        assert!(mid.iter().all(|c| *c > 240), "middle of bwr is near white: {:?}", mid);
    }

    #[test]
    fn test_symmetric_stretch_ignores_invalid() {
        let data = Array2::from_shape_vec((1, 4), vec![-0.2, 0.1, 5.0, 0.0]).unwrap();
        let valid = Array2::from_shape_vec((1, 4), vec![true, true, false, true]).unwrap();
        let raster = Raster::new(data, valid, utm_georef(1, 4)).unwrap();
        let s = Stretch::symmetric(&raster);
        assert_eq!(s, Stretch { min: -0.2, max: 0.2 });
        assert_eq!(s.to_u8(0.0), 128);
    }

    #[test]
    fn test_colorize_paints_invalid_black() {
        let data = Array2::from_shape_vec((1, 2), vec![1.0, f64::NAN]).unwrap();
        let valid = Array2::from_shape_vec((1, 2), vec![true, false]).unwrap();
        let raster = Raster::new(data, valid, utm_georef(1, 2)).unwrap();
        let rgb = colorize(&raster, Colormap::RdYlGn, Stretch { min: -1.0, max: 1.0 });
        assert_eq!(&rgb[0..3], &[0, 104, 55]);
        assert_eq!(&rgb[3..6], &NODATA_RGB);
    }
}

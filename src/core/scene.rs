//! Multispectral capture of one epoch: role-typed bands on a shared grid.
use std::collections::BTreeMap;

use ndarray::{Array2, Zip};

use crate::core::raster::{Georeference, Raster, Window};
use crate::error::{Error, Result};
use crate::types::{BandRole, SpectralIndex};

/// One spectral band in reflectance units
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub role: BandRole,
    pub raster: Raster<f64>,
}

impl Band {
    pub fn new(role: BandRole, raster: Raster<f64>) -> Self {
        Self { role, raster }
    }
}

/// Bands of one capture sharing a georeference, plus an optional quality mask
/// (`true` = usable).
#[derive(Debug, Clone)]
pub struct Scene {
    georef: Georeference,
    bands: BTreeMap<BandRole, Band>,
    quality: Option<Array2<bool>>,
}

impl Scene {
    pub fn new(georef: Georeference) -> Self {
        Self {
            georef,
            bands: BTreeMap::new(),
            quality: None,
        }
    }

    /// Add a band; it must sit on the scene grid.
    pub fn with_band(mut self, band: Band) -> Result<Self> {
        band.raster
            .georef()
            .ensure_matches(&self.georef, &band.role.to_string(), "scene")?;
        self.bands.insert(band.role, band);
        Ok(self)
    }

    pub fn with_quality_mask(mut self, usable: Array2<bool>) -> Result<Self> {
        if usable.dim() != self.georef.shape() {
            return Err(Error::GeometryMismatch {
                left: "quality mask".to_string(),
                right: "scene".to_string(),
                detail: format!("shape {:?} vs {:?}", usable.dim(), self.georef.shape()),
            });
        }
        self.quality = Some(usable);
        Ok(self)
    }

    pub fn georef(&self) -> &Georeference {
        &self.georef
    }

    pub fn shape(&self) -> (usize, usize) {
        self.georef.shape()
    }

    pub fn roles(&self) -> Vec<BandRole> {
        self.bands.keys().copied().collect()
    }

    pub fn band(&self, role: BandRole) -> Result<&Band> {
        self.bands
            .get(&role)
            .ok_or_else(|| Error::missing_band(role, None))
    }

    pub fn quality_mask(&self) -> Option<&Array2<bool>> {
        self.quality.as_ref()
    }

    /// Check up front that every band `index` reads is present
    pub fn ensure_bands_for(&self, index: SpectralIndex) -> Result<()> {
        for role in index.required_bands() {
            if !self.bands.contains_key(role) {
                return Err(Error::missing_band(*role, Some(index)));
            }
        }
        Ok(())
    }

    /// Pixels valid in every band and not rejected by the quality mask
    pub fn valid_mask(&self) -> Array2<bool> {
        let mut mask = self
            .quality
            .clone()
            .unwrap_or_else(|| Array2::from_elem(self.georef.shape(), true));
        for band in self.bands.values() {
            Zip::from(&mut mask)
                .and(band.raster.valid_mask())
                .for_each(|m, &v| *m = *m && v);
        }
        mask
    }

    pub fn invalid_fraction(&self) -> f64 {
        let mask = self.valid_mask();
        if mask.is_empty() {
            return 0.0;
        }
        mask.iter().filter(|v| !**v).count() as f64 / mask.len() as f64
    }

    /// Copy of a sub-window of every band and the quality mask
    pub fn window(&self, window: &Window) -> Result<Scene> {
        let mut out = Scene::new(self.georef.window(window));
        for band in self.bands.values() {
            out.bands
                .insert(band.role, Band::new(band.role, band.raster.window(window)?));
        }
        if let Some(q) = &self.quality {
            out.quality = Some(
                q.slice(ndarray::s![
                    window.row_off..window.row_off + window.rows,
                    window.col_off..window.col_off + window.cols
                ])
                .to_owned(),
            );
        }
        Ok(out)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::core::raster::{Crs, GeoTransform};

    pub fn utm_georef(rows: usize, cols: usize) -> Georeference {
        Georeference::new(
            rows,
            cols,
            GeoTransform::new(300_000.0, 2_710_000.0, 10.0, -10.0),
            Crs::projected_epsg(32640),
        )
    }

    /// Scene where every role holds a constant reflectance
    pub fn uniform_scene(rows: usize, cols: usize, values: &[(BandRole, f64)]) -> Scene {
        let georef = utm_georef(rows, cols);
        let mut scene = Scene::new(georef.clone());
        for (role, v) in values {
            let raster = Raster::from_data(Array2::from_elem((rows, cols), *v), georef.clone())
                .expect("uniform band");
            scene = scene.with_band(Band::new(*role, raster)).expect("band");
        }
        scene
    }

    /// Scene built from per-pixel closures
    pub fn scene_from_fn(
        rows: usize,
        cols: usize,
        roles: &[BandRole],
        f: impl Fn(BandRole, usize, usize) -> Option<f64>,
    ) -> Scene {
        let georef = utm_georef(rows, cols);
        let mut scene = Scene::new(georef.clone());
        for role in roles {
            let data = Array2::from_shape_fn((rows, cols), |(r, c)| {
                f(*role, r, c).unwrap_or(f64::NAN)
            });
            let valid = Array2::from_shape_fn((rows, cols), |(r, c)| f(*role, r, c).is_some());
            let raster = Raster::new(data, valid, georef.clone()).expect("band");
            scene = scene.with_band(Band::new(*role, raster)).expect("band");
        }
        scene
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_missing_band_is_reported_with_index_context() {
        let scene = uniform_scene(2, 2, &[(BandRole::Nir, 0.5)]);
        match scene.ensure_bands_for(SpectralIndex::Ndvi) {
            Err(Error::MissingBand { role, index, .. }) => {
                assert_eq!(role, BandRole::Red);
                assert_eq!(index, "NDVI");
            }
            other => panic!("expected MissingBand, got {:?}", other),
        }
        assert!(scene.band(BandRole::Blue).is_err());
    }

    #[test]
    fn test_valid_mask_combines_bands_and_quality() {
        let scene = scene_from_fn(2, 2, &[BandRole::Red, BandRole::Nir], |role, r, c| {
            if role == BandRole::Red && r == 0 && c == 0 {
                None
            } else {
                Some(0.3)
            }
        });
        let mut quality = Array2::from_elem((2, 2), true);
        quality[[1, 1]] = false;
        let scene = scene.with_quality_mask(quality).unwrap();
        let mask = scene.valid_mask();
        assert!(!mask[[0, 0]]);
        assert!(mask[[0, 1]]);
        assert!(mask[[1, 0]]);
        assert!(!mask[[1, 1]]);
        assert!((scene.invalid_fraction() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_band_off_grid_is_rejected() {
        let scene = Scene::new(utm_georef(2, 2));
        let raster = Raster::from_data(Array2::zeros((3, 3)), utm_georef(3, 3)).unwrap();
        assert!(matches!(
            scene.with_band(Band::new(BandRole::Red, raster)),
            Err(Error::GeometryMismatch { .. })
        ));
    }
}

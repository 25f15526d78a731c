//! Georeferenced raster grid with an explicit validity mask.
use ndarray::{Array2, s};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Relative tolerance used when comparing transform coefficients of two rasters
const TRANSFORM_RTOL: f64 = 1e-9;

/// Affine transformation coefficients.
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Usually negative for north-up images
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

impl GeoTransform {
    /// North-up transform without rotation
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// From GDAL order `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            origin_x: gt[0],
            pixel_width: gt[1],
            row_rotation: gt[2],
            origin_y: gt[3],
            col_rotation: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// GDAL's default transform for ungeoreferenced files
    pub fn is_identity(&self) -> bool {
        self.to_gdal() == [0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
    }

    pub fn is_north_up(&self) -> bool {
        self.row_rotation == 0.0 && self.col_rotation == 0.0
    }

    /// Signed pixel area in CRS units squared
    pub fn determinant(&self) -> f64 {
        self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation
    }

    /// Geographic coordinates of a (fractional) pixel position
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// Pixel-center coordinates
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Transform of a sub-window starting at (row_off, col_off)
    pub fn shifted(&self, row_off: usize, col_off: usize) -> Self {
        let (x, y) = self.apply(col_off as f64, row_off as f64);
        Self {
            origin_x: x,
            origin_y: y,
            ..*self
        }
    }

    /// Bounds as (min_x, min_y, max_x, max_y) over the four corners
    pub fn bounds(&self, rows: usize, cols: usize) -> (f64, f64, f64, f64) {
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(cols as f64, 0.0),
            self.apply(0.0, rows as f64),
            self.apply(cols as f64, rows as f64),
        ];
        let mut b = (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in corners {
            b.0 = b.0.min(x);
            b.1 = b.1.min(y);
            b.2 = b.2.max(x);
            b.3 = b.3.max(y);
        }
        b
    }

    fn approx_eq(&self, other: &GeoTransform) -> bool {
        self.to_gdal()
            .iter()
            .zip(other.to_gdal().iter())
            .all(|(a, b)| {
                let scale = a.abs().max(b.abs()).max(1.0);
                (a - b).abs() <= TRANSFORM_RTOL * scale
            })
    }
}

/// Coordinate reference system as read from the source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crs {
    /// WKT representation
    pub wkt: String,
    /// EPSG code if the authority is known
    pub epsg: Option<u32>,
    /// Geographic (degrees) rather than projected
    pub geographic: bool,
    /// Size of one projected linear unit in metres (1.0 for metre-based CRSs)
    pub linear_unit_m: f64,
}

impl Crs {
    /// Projected CRS from an EPSG code with metre units (e.g. UTM zones)
    pub fn projected_epsg(code: u32) -> Self {
        Self {
            wkt: String::new(),
            epsg: Some(code),
            geographic: false,
            linear_unit_m: 1.0,
        }
    }

    /// WGS84 geographic (EPSG:4326)
    pub fn wgs84() -> Self {
        Self {
            wkt: String::new(),
            epsg: Some(4326),
            geographic: true,
            linear_unit_m: 1.0,
        }
    }

    pub fn is_equivalent(&self, other: &Crs) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }
        !self.wkt.is_empty() && self.wkt == other.wkt
    }

    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if self.wkt.is_empty() {
            return "unknown".to_string();
        }
        format!("WKT:{}", self.wkt.chars().take(50).collect::<String>())
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

/// Everything needed to place a grid on the ground
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Georeference {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub crs: Crs,
}

impl Georeference {
    pub fn new(rows: usize, cols: usize, transform: GeoTransform, crs: Crs) -> Self {
        Self {
            rows,
            cols,
            transform,
            crs,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Fail with `GeometryMismatch` unless shape, transform and CRS all agree.
    pub fn ensure_matches(&self, other: &Georeference, left: &str, right: &str) -> Result<()> {
        let mismatch = |detail: String| Error::GeometryMismatch {
            left: left.to_string(),
            right: right.to_string(),
            detail,
        };
        if self.shape() != other.shape() {
            return Err(mismatch(format!(
                "shape {}x{} vs {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        if !self.transform.approx_eq(&other.transform) {
            return Err(mismatch(format!(
                "geotransform {:?} vs {:?}",
                self.transform.to_gdal(),
                other.transform.to_gdal()
            )));
        }
        if !self.crs.is_equivalent(&other.crs) {
            return Err(mismatch(format!("CRS {} vs {}", self.crs, other.crs)));
        }
        Ok(())
    }

    /// Georeference of a sub-window
    pub fn window(&self, window: &Window) -> Self {
        Self {
            rows: window.rows,
            cols: window.cols,
            transform: self.transform.shifted(window.row_off, window.col_off),
            crs: self.crs.clone(),
        }
    }
}

/// Rectangular pixel window inside a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub row_off: usize,
    pub col_off: usize,
    pub rows: usize,
    pub cols: usize,
}

impl Window {
    pub fn new(row_off: usize, col_off: usize, rows: usize, cols: usize) -> Self {
        Self {
            row_off,
            col_off,
            rows,
            cols,
        }
    }

    pub fn fits(&self, rows: usize, cols: usize) -> bool {
        self.row_off + self.rows <= rows && self.col_off + self.cols <= cols
    }
}

/// A 2D grid of samples with a per-pixel validity mask and georeference.
///
/// The mask is authoritative: consumers must never read a sample whose mask
/// entry is `false`.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T> {
    data: Array2<T>,
    valid: Array2<bool>,
    georef: Georeference,
}

impl<T: Copy> Raster<T> {
    pub fn new(data: Array2<T>, valid: Array2<bool>, georef: Georeference) -> Result<Self> {
        if data.dim() != valid.dim() || data.dim() != georef.shape() {
            return Err(Error::Format(format!(
                "raster parts disagree: data {:?}, mask {:?}, georeference {:?}",
                data.dim(),
                valid.dim(),
                georef.shape()
            )));
        }
        Ok(Self {
            data,
            valid,
            georef,
        })
    }

    /// Every pixel valid
    pub fn from_data(data: Array2<T>, georef: Georeference) -> Result<Self> {
        let valid = Array2::from_elem(data.dim(), true);
        Self::new(data, valid, georef)
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn valid_mask(&self) -> &Array2<bool> {
        &self.valid
    }

    pub fn georef(&self) -> &Georeference {
        &self.georef
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at (row, col), `None` when invalid or out of range
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        match self.valid.get((row, col)) {
            Some(true) => self.data.get((row, col)).copied(),
            _ => None,
        }
    }

    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.valid.get((row, col)).copied().unwrap_or(false)
    }

    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|v| **v).count()
    }

    pub fn invalid_fraction(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        (self.len() - self.valid_count()) as f64 / self.len() as f64
    }

    pub fn into_parts(self) -> (Array2<T>, Array2<bool>, Georeference) {
        (self.data, self.valid, self.georef)
    }

    /// Copy out a sub-window with its shifted georeference
    pub fn window(&self, window: &Window) -> Result<Self> {
        let (rows, cols) = self.shape();
        if !window.fits(rows, cols) {
            return Err(Error::InvalidArgument {
                arg: "window",
                value: format!("{:?} outside {}x{}", window, rows, cols),
            });
        }
        let sl = s![
            window.row_off..window.row_off + window.rows,
            window.col_off..window.col_off + window.cols
        ];
        Ok(Self {
            data: self.data.slice(sl).to_owned(),
            valid: self.valid.slice(sl).to_owned(),
            georef: self.georef.window(window),
        })
    }

    /// Write a tile back into this raster at its window position
    pub fn paste(&mut self, window: &Window, tile: &Raster<T>) -> Result<()> {
        let (rows, cols) = self.shape();
        if !window.fits(rows, cols) || tile.shape() != (window.rows, window.cols) {
            return Err(Error::InvalidArgument {
                arg: "window",
                value: format!("{:?} for tile {:?} in {}x{}", window, tile.shape(), rows, cols),
            });
        }
        let sl = s![
            window.row_off..window.row_off + window.rows,
            window.col_off..window.col_off + window.cols
        ];
        self.data.slice_mut(sl).assign(&tile.data);
        self.valid.slice_mut(sl).assign(&tile.valid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn georef(rows: usize, cols: usize) -> Georeference {
        Georeference::new(
            rows,
            cols,
            GeoTransform::new(500_000.0, 2_700_000.0, 10.0, -10.0),
            Crs::projected_epsg(32640),
        )
    }

    #[test]
    fn test_gdal_order_round_trip() {
        let gt = [100.0, 10.0, 0.5, 200.0, 0.25, -10.0];
        assert_eq!(GeoTransform::from_gdal(gt).to_gdal(), gt);
    }

    #[test]
    fn test_window_shifts_origin() {
        let g = georef(10, 10);
        let w = g.window(&Window::new(2, 3, 4, 4));
        assert_eq!(w.transform.origin_x, 500_030.0);
        assert_eq!(w.transform.origin_y, 2_699_980.0);
        assert_eq!(w.shape(), (4, 4));
    }

    #[test]
    fn test_mismatched_shape_is_rejected() {
        let err = georef(4, 4)
            .ensure_matches(&georef(4, 5), "before", "after")
            .unwrap_err();
        assert!(matches!(err, Error::GeometryMismatch { .. }));
    }

    #[test]
    fn test_mismatched_crs_is_rejected() {
        let mut other = georef(4, 4);
        other.crs = Crs::projected_epsg(32639);
        assert!(georef(4, 4).ensure_matches(&other, "a", "b").is_err());
    }

    #[test]
    fn test_mismatched_transform_is_rejected() {
        let mut other = georef(4, 4);
        other.transform.pixel_width = 20.0;
        assert!(georef(4, 4).ensure_matches(&other, "a", "b").is_err());
        assert!(georef(4, 4).ensure_matches(&georef(4, 4), "a", "b").is_ok());
    }

    #[test]
    fn test_get_respects_mask() {
        let data = Array2::from_elem((2, 2), 0.5_f64);
        let mut valid = Array2::from_elem((2, 2), true);
        valid[[1, 1]] = false;
        let r = Raster::new(data, valid, georef(2, 2)).unwrap();
        assert_eq!(r.get(0, 0), Some(0.5));
        assert_eq!(r.get(1, 1), None);
        assert_eq!(r.get(5, 5), None);
        assert_eq!(r.valid_count(), 3);
        assert!((r.invalid_fraction() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_window_then_paste_restores() {
        let data = Array2::from_shape_fn((4, 6), |(r, c)| (r * 6 + c) as f64);
        let full = Raster::from_data(data, georef(4, 6)).unwrap();
        let win = Window::new(1, 2, 2, 3);
        let tile = full.window(&win).unwrap();
        assert_eq!(tile.get(0, 0), Some(8.0));

        let blank = Raster::from_data(Array2::zeros((4, 6)), georef(4, 6)).unwrap();
        let mut rebuilt = blank.clone();
        rebuilt.paste(&win, &tile).unwrap();
        assert_eq!(rebuilt.get(2, 4), full.get(2, 4));
        assert_eq!(rebuilt.get(0, 0), Some(0.0));
    }

    #[test]
    fn test_parts_must_agree() {
        let data = Array2::<f64>::zeros((2, 2));
        let valid = Array2::from_elem((2, 3), true);
        assert!(Raster::new(data, valid, georef(2, 2)).is_err());
    }
}

//! Ground area of change classes.
//!
//! Projected grids start from the absolute determinant of the geotransform, so
//! rotated and non-square pixels need no special casing. That planar area is then
//! checked against the ellipsoidal area of sampled pixel footprints, reprojected to
//! longitude/latitude through GDAL; grids whose projection scale departs from 1
//! (Web Mercator, polar stereographic) are flagged and, depending on the
//! [`AreaModel`], measured per pixel on the ellipsoid instead. Geographic grids are
//! measured on the WGS84 ellipsoid: per row with the exact area of a lat/lon band
//! for north-up grids, per pixel with the local radii of curvature otherwise.
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use ndarray::Array2;
use serde::Serialize;
use tracing::debug;

use crate::core::change::ChangeMask;
use crate::core::params::AreaParams;
use crate::core::quality::DataQualityWarning;
use crate::core::raster::{Crs, Georeference};
use crate::error::{Error, Result};
use crate::types::{AreaModel, ChangeClass, ChangeMode};

/// WGS84 semi-major axis (m)
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening
const WGS84_F: f64 = 1.0 / 298.257_223_563;

const M2_PER_KM2: f64 = 1.0e6;

/// Ground area of each pixel in m²
#[derive(Debug, Clone, PartialEq)]
pub enum PixelArea {
    Uniform(f64),
    /// One value per row (north-up geographic grids)
    PerRow(Vec<f64>),
    PerPixel(Array2<f64>),
}

impl PixelArea {
    /// Areas from the geotransform alone; projected grids are taken as planar
    pub fn from_georeference(georef: &Georeference) -> Result<Self> {
        let gt = &georef.transform;
        let det = gt.determinant();
        if det == 0.0 || !det.is_finite() {
            return Err(Error::Georeference(format!(
                "degenerate geotransform {:?}",
                gt.to_gdal()
            )));
        }

        if !georef.crs.geographic {
            let unit = georef.crs.linear_unit_m;
            return Ok(PixelArea::Uniform(det.abs() * unit * unit));
        }

        let e2 = WGS84_F * (2.0 - WGS84_F);
        if gt.is_north_up() {
            let dlon = gt.pixel_width.abs().to_radians();
            let rows = (0..georef.rows)
                .map(|r| {
                    let lat1 = gt.origin_y + r as f64 * gt.pixel_height;
                    let lat2 = lat1 + gt.pixel_height;
                    ellipsoidal_band_area(lat1, lat2, dlon, e2)
                })
                .collect();
            return Ok(PixelArea::PerRow(rows));
        }

        let det_rad2 = det.abs() * (std::f64::consts::PI / 180.0).powi(2);
        let areas = Array2::from_shape_fn(georef.shape(), |(r, c)| {
            let (_, lat) = gt.pixel_center(c, r);
            let phi = lat.clamp(-90.0, 90.0).to_radians();
            let (m, n) = radii_of_curvature(phi, e2);
            m * n * phi.cos() * det_rad2
        });
        Ok(PixelArea::PerPixel(areas))
    }

    /// Pixel areas with the projection scale of projected grids accounted for.
    ///
    /// Geographic grids are returned as from [`PixelArea::from_georeference`]. For
    /// projected grids the ratio of ground to planar area is sampled across the
    /// grid; beyond `params.distortion_tolerance` a `ProjectionDistortion` warning
    /// is returned and, unless the model is `Planar`, every pixel is measured on
    /// the ellipsoid. A CRS GDAL cannot resolve keeps planar areas with an
    /// `AreaUnverified` warning.
    pub fn measure(
        georef: &Georeference,
        params: &AreaParams,
    ) -> Result<(Self, Option<DataQualityWarning>)> {
        let planar = Self::from_georeference(georef)?;
        if georef.crs.geographic || georef.rows == 0 || georef.cols == 0 {
            return Ok((planar, None));
        }
        let crs = georef.crs.identifier();
        let unverified = |e: Error| {
            Some(
                DataQualityWarning::AreaUnverified {
                    crs: crs.clone(),
                    reason: e.to_string(),
                }
                .raise(),
            )
        };

        let nominal = planar.nominal();
        let to_lonlat = match LonLat::for_crs(&georef.crs) {
            Ok(t) => t,
            Err(e) => return Ok((planar, unverified(e))),
        };
        let tol = params.distortion_tolerance;
        let measure_all = || -> Result<((f64, f64), Option<Array2<f64>>)> {
            let areas = ground_areas(georef, &to_lonlat)?;
            Ok((scale_range(areas.iter().copied(), nominal)?, Some(areas)))
        };
        let measured = match params.model {
            AreaModel::Ground => measure_all(),
            AreaModel::Auto | AreaModel::Planar => {
                sampled_scale_range(georef, &to_lonlat, nominal).and_then(|(lo, hi)| {
                    debug!("{}: sampled ground/planar area {:.5}..{:.5}", crs, lo, hi);
                    if params.model == AreaModel::Auto && is_distorted(lo, hi, tol) {
                        measure_all()
                    } else {
                        Ok(((lo, hi), None))
                    }
                })
            }
        };
        let ((lo, hi), ground) = match measured {
            Ok(m) => m,
            Err(e) => return Ok((planar, unverified(e))),
        };
        let warning = is_distorted(lo, hi, tol).then(|| {
            DataQualityWarning::ProjectionDistortion {
                crs: crs.clone(),
                min_scale: lo,
                max_scale: hi,
                corrected: ground.is_some(),
            }
            .raise()
        });
        let area = match ground {
            Some(areas) => PixelArea::PerPixel(areas),
            None => planar,
        };
        Ok((area, warning))
    }

    pub fn at(&self, row: usize, col: usize) -> f64 {
        match self {
            PixelArea::Uniform(a) => *a,
            PixelArea::PerRow(rows) => rows.get(row).copied().unwrap_or(0.0),
            PixelArea::PerPixel(a) => a.get((row, col)).copied().unwrap_or(0.0),
        }
    }

    /// Representative single-pixel area: exact for uniform grids, the mean otherwise
    pub fn nominal(&self) -> f64 {
        let mean = |sum: f64, n: usize| if n == 0 { 0.0 } else { sum / n as f64 };
        match self {
            PixelArea::Uniform(a) => *a,
            PixelArea::PerRow(rows) => mean(rows.iter().sum(), rows.len()),
            PixelArea::PerPixel(a) => mean(a.sum(), a.len()),
        }
    }

    fn ensure_shape(&self, rows: usize, cols: usize) -> Result<()> {
        let ok = match self {
            PixelArea::Uniform(_) => true,
            PixelArea::PerRow(r) => r.len() == rows,
            PixelArea::PerPixel(a) => a.dim() == (rows, cols),
        };
        if ok {
            Ok(())
        } else {
            Err(Error::GeometryMismatch {
                left: "pixel areas".to_string(),
                right: "change mask".to_string(),
                detail: format!("mask is {}x{}", rows, cols),
            })
        }
    }
}

/// Meridian (M) and prime-vertical (N) radii of curvature at latitude `phi` (rad)
fn radii_of_curvature(phi: f64, e2: f64) -> (f64, f64) {
    let w2 = 1.0 - e2 * phi.sin().powi(2);
    let n = WGS84_A / w2.sqrt();
    let m = WGS84_A * (1.0 - e2) / w2.powf(1.5);
    (m, n)
}

/// Area in m² of the ellipsoid between latitudes `lat1`/`lat2` (degrees) over a
/// longitude span of `dlon` radians.
fn ellipsoidal_band_area(lat1: f64, lat2: f64, dlon: f64, e2: f64) -> f64 {
    let e = e2.sqrt();
    let b2 = WGS84_A * WGS84_A * (1.0 - e2);
    let g = |lat_deg: f64| {
        let s = lat_deg.clamp(-90.0, 90.0).to_radians().sin();
        s / (1.0 - e2 * s * s) + (1.0 / (2.0 * e)) * ((1.0 + e * s) / (1.0 - e * s)).ln()
    };
    (b2 * dlon / 2.0) * (g(lat2) - g(lat1)).abs()
}

/// Projected coordinates to longitude/latitude degrees on the CRS's own datum
struct LonLat(CoordTransform);

impl LonLat {
    fn for_crs(crs: &Crs) -> Result<Self> {
        let mut projected = if !crs.wkt.is_empty() {
            SpatialRef::from_wkt(&crs.wkt)?
        } else if let Some(code) = crs.epsg {
            SpatialRef::from_epsg(code)?
        } else {
            return Err(Error::Georeference(
                "CRS has neither WKT nor EPSG code".to_string(),
            ));
        };
        let mut geographic = projected.geog_cs()?;
        projected.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
        geographic.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
        Ok(Self(CoordTransform::new(&projected, &geographic)?))
    }

    fn apply(&self, xs: &mut [f64], ys: &mut [f64]) -> Result<()> {
        self.0.transform_coords(xs, ys, &mut [])?;
        Ok(())
    }
}

/// Corner offsets of a pixel in ring order
const RING: [(usize, usize); 4] = [(0, 0), (1, 0), (1, 1), (0, 1)];

/// Ellipsoidal area (m²) of a small lon/lat quadrilateral, corners in ring order
fn footprint_area(lons: &[f64], lats: &[f64]) -> f64 {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let lon0 = lons[0];
    let pts: Vec<(f64, f64)> = lons
        .iter()
        .zip(lats)
        .map(|(lon, lat)| {
            let mut dlon = lon - lon0;
            if dlon > 180.0 {
                dlon -= 360.0;
            } else if dlon < -180.0 {
                dlon += 360.0;
            }
            (dlon.to_radians(), lat.clamp(-90.0, 90.0).to_radians())
        })
        .collect();
    let phi = pts.iter().map(|p| p.1).sum::<f64>() / pts.len() as f64;
    let twice: f64 = (0..pts.len())
        .map(|i| {
            let (x1, y1) = pts[i];
            let (x2, y2) = pts[(i + 1) % pts.len()];
            x1 * y2 - x2 * y1
        })
        .sum();
    let (m, n) = radii_of_curvature(phi, e2);
    m * n * phi.cos() * twice.abs() / 2.0
}

/// Up to five evenly spread positions in `0..n`
fn sample_positions(n: usize) -> Vec<usize> {
    let mut out: Vec<usize> = (0..5).map(|i| i * n.saturating_sub(1) / 4).collect();
    out.dedup();
    out
}

fn sampled_scale_range(georef: &Georeference, to_lonlat: &LonLat, planar: f64) -> Result<(f64, f64)> {
    let gt = &georef.transform;
    let rows = sample_positions(georef.rows);
    let cols = sample_positions(georef.cols);
    let n = rows.len() * cols.len() * RING.len();
    let (mut xs, mut ys) = (Vec::with_capacity(n), Vec::with_capacity(n));
    for r in &rows {
        for c in &cols {
            for (dc, dr) in RING {
                let (x, y) = gt.apply((c + dc) as f64, (r + dr) as f64);
                xs.push(x);
                ys.push(y);
            }
        }
    }
    to_lonlat.apply(&mut xs, &mut ys)?;
    let areas = xs
        .chunks(RING.len())
        .zip(ys.chunks(RING.len()))
        .map(|(lons, lats)| footprint_area(lons, lats));
    scale_range(areas, planar)
}

/// Ellipsoidal area of every pixel, one row of corners transformed at a time
fn ground_areas(georef: &Georeference, to_lonlat: &LonLat) -> Result<Array2<f64>> {
    let gt = &georef.transform;
    let (rows, cols) = georef.shape();
    let corner_row = |r: usize| -> Result<(Vec<f64>, Vec<f64>)> {
        let (mut xs, mut ys): (Vec<f64>, Vec<f64>) =
            (0..=cols).map(|c| gt.apply(c as f64, r as f64)).unzip();
        to_lonlat.apply(&mut xs, &mut ys)?;
        Ok((xs, ys))
    };

    let mut areas = Array2::zeros((rows, cols));
    let mut top = corner_row(0)?;
    for r in 0..rows {
        let bottom = corner_row(r + 1)?;
        for c in 0..cols {
            let lons = [top.0[c], top.0[c + 1], bottom.0[c + 1], bottom.0[c]];
            let lats = [top.1[c], top.1[c + 1], bottom.1[c + 1], bottom.1[c]];
            areas[[r, c]] = footprint_area(&lons, &lats);
        }
        top = bottom;
    }
    debug!("measured {}x{} pixel footprints on the ellipsoid", rows, cols);
    Ok(areas)
}

/// Smallest and largest ground/planar ratio
fn scale_range(areas: impl Iterator<Item = f64>, planar: f64) -> Result<(f64, f64)> {
    let mut range = (f64::INFINITY, f64::NEG_INFINITY);
    for a in areas {
        if !a.is_finite() || a <= 0.0 {
            return Err(Error::Georeference(format!("invalid ground pixel area {}", a)));
        }
        let scale = a / planar;
        range = (range.0.min(scale), range.1.max(scale));
    }
    Ok(range)
}

fn is_distorted(lo: f64, hi: f64, tolerance: f64) -> bool {
    (1.0 - lo).max(hi - 1.0) > tolerance
}

/// Per-class pixel counts and areas of one change mask.
///
/// `unchanged_pixels + changed_pixels + invalid_pixels == total_pixels`, and in
/// signed mode `increase_pixels + decrease_pixels == changed_pixels`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaStats {
    pub mode: ChangeMode,
    pub threshold: f64,
    pub total_pixels: usize,
    pub invalid_pixels: usize,
    pub unchanged_pixels: usize,
    pub changed_pixels: usize,
    pub increase_pixels: usize,
    pub decrease_pixels: usize,
    /// Nominal area of one pixel (m²)
    pub pixel_area_m2: f64,
    pub valid_area_m2: f64,
    pub changed_area_m2: f64,
    pub increase_area_m2: f64,
    pub decrease_area_m2: f64,
    pub valid_area_km2: f64,
    pub changed_area_km2: f64,
    pub increase_area_km2: f64,
    pub decrease_area_km2: f64,
    /// Changed share of the valid area; `None` without valid pixels
    pub changed_fraction: Option<f64>,
}

#[derive(Default)]
struct Tally {
    count: usize,
    area: f64,
}

impl Tally {
    fn add(&mut self, area: f64) {
        self.count += 1;
        self.area += area;
    }
}

pub fn aggregate_area(mask: &ChangeMask, pixel_area: &PixelArea) -> Result<AreaStats> {
    let (rows, cols) = mask.raster.shape();
    pixel_area.ensure_shape(rows, cols)?;

    let mut invalid = 0usize;
    let mut unchanged = Tally::default();
    let mut changed = Tally::default();
    let mut increase = Tally::default();
    let mut decrease = Tally::default();

    for ((r, c), class) in mask.raster.data().indexed_iter() {
        let area = pixel_area.at(r, c);
        match class {
            ChangeClass::Invalid => invalid += 1,
            ChangeClass::Unchanged => unchanged.add(area),
            ChangeClass::Changed => changed.add(area),
            ChangeClass::Increase => increase.add(area),
            ChangeClass::Decrease => decrease.add(area),
        }
    }

    let changed_pixels = changed.count + increase.count + decrease.count;
    let changed_area = changed.area + increase.area + decrease.area;
    let valid_area = unchanged.area + changed_area;
    let changed_fraction = (unchanged.count + changed_pixels > 0 && valid_area > 0.0)
        .then(|| changed_area / valid_area);

    let stats = AreaStats {
        mode: mask.mode,
        threshold: mask.threshold,
        total_pixels: rows * cols,
        invalid_pixels: invalid,
        unchanged_pixels: unchanged.count,
        changed_pixels,
        increase_pixels: increase.count,
        decrease_pixels: decrease.count,
        pixel_area_m2: pixel_area.nominal(),
        valid_area_m2: valid_area,
        changed_area_m2: changed_area,
        increase_area_m2: increase.area,
        decrease_area_m2: decrease.area,
        valid_area_km2: valid_area / M2_PER_KM2,
        changed_area_km2: changed_area / M2_PER_KM2,
        increase_area_km2: increase.area / M2_PER_KM2,
        decrease_area_km2: decrease.area / M2_PER_KM2,
        changed_fraction,
    };
    debug!(
        "area: {} changed / {} valid / {} invalid pixels, {:.4} km² changed",
        stats.changed_pixels,
        stats.unchanged_pixels + stats.changed_pixels,
        stats.invalid_pixels,
        stats.changed_area_km2
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::raster::{Crs, GeoTransform, Raster};
    use crate::core::scene::test_support::utm_georef;

    fn mask_of(classes: Array2<ChangeClass>, georef: Georeference, mode: ChangeMode) -> ChangeMask {
        let valid = classes.mapv(|c| c != ChangeClass::Invalid);
        ChangeMask {
            mode,
            threshold: 0.1,
            raster: Raster::new(classes, valid, georef).unwrap(),
        }
    }

    #[test]
    fn test_hundred_changed_pixels_at_10m() {
        let georef = utm_georef(10, 10);
        let mask = mask_of(
            Array2::from_elem((10, 10), ChangeClass::Changed),
            georef.clone(),
            ChangeMode::Binary,
        );
        let area = PixelArea::from_georeference(&georef).unwrap();
        assert_eq!(area, PixelArea::Uniform(100.0));
        let stats = aggregate_area(&mask, &area).unwrap();
        assert_eq!(stats.changed_pixels, 100);
        assert!((stats.changed_area_km2 - 0.01).abs() < 1e-12, "{}", stats.changed_area_km2);
        assert_eq!(stats.changed_fraction, Some(1.0));
    }

    #[test]
    fn test_counts_are_conserved_and_invalid_excluded() {
        let georef = utm_georef(2, 3);
        let classes = ndarray::arr2(&[
            [ChangeClass::Invalid, ChangeClass::Increase, ChangeClass::Decrease],
            [ChangeClass::Unchanged, ChangeClass::Invalid, ChangeClass::Increase],
        ]);
        let mask = mask_of(classes, georef.clone(), ChangeMode::Signed);
        let area = PixelArea::from_georeference(&georef).unwrap();
        let stats = aggregate_area(&mask, &area).unwrap();
        assert_eq!(
            stats.unchanged_pixels + stats.changed_pixels + stats.invalid_pixels,
            stats.total_pixels
        );
        assert_eq!(stats.increase_pixels, 2);
        assert_eq!(stats.decrease_pixels, 1);
        assert_eq!(stats.increase_pixels + stats.decrease_pixels, stats.changed_pixels);
        let f = stats.changed_fraction.unwrap();
        assert!((f - 0.75).abs() < 1e-12, "3 of 4 valid pixels changed, got {}", f);
    }

    #[test]
    fn test_all_invalid_has_no_fraction() {
        let georef = utm_georef(2, 2);
        let mask = mask_of(
            Array2::from_elem((2, 2), ChangeClass::Invalid),
            georef.clone(),
            ChangeMode::Binary,
        );
        let stats =
            aggregate_area(&mask, &PixelArea::from_georeference(&georef).unwrap()).unwrap();
        assert_eq!(stats.changed_fraction, None);
        assert_eq!(stats.invalid_pixels, 4);
    }

    #[test]
    fn test_rotated_non_square_pixels_use_determinant() {
        let mut gt = GeoTransform::new(0.0, 0.0, 20.0, -10.0);
        gt.row_rotation = 5.0;
        gt.col_rotation = 2.0;
        let georef = Georeference::new(1, 1, gt, Crs::projected_epsg(32633));
        let expected = (20.0_f64 * -10.0 - 5.0 * 2.0).abs();
        assert_eq!(
            PixelArea::from_georeference(&georef).unwrap(),
            PixelArea::Uniform(expected)
        );
    }

    #[test]
    fn test_projected_foot_units() {
        let mut crs = Crs::projected_epsg(2263);
        crs.linear_unit_m = 0.3048;
        let georef = Georeference::new(1, 1, GeoTransform::new(0.0, 0.0, 10.0, -10.0), crs);
        match PixelArea::from_georeference(&georef).unwrap() {
            PixelArea::Uniform(a) => assert!((a - 9.290304).abs() < 1e-9),
            other => panic!("expected uniform area, got {:?}", other),
        }
    }

    #[test]
    fn test_one_degree_cell_at_equator() {
        let georef = Georeference::new(
            1,
            1,
            GeoTransform::new(0.0, 1.0, 1.0, -1.0),
            Crs::wgs84(),
        );
        let area = PixelArea::from_georeference(&georef).unwrap();
        let km2 = area.at(0, 0) / M2_PER_KM2;
        assert!(
            (km2 - 12_308.0).abs() / 12_308.0 < 0.005,
            "1x1 degree equatorial cell should be ~12,308 km², got {}",
            km2
        );
    }

    #[test]
    fn test_geographic_rows_shrink_towards_pole() {
        let georef = Georeference::new(
            3,
            1,
            GeoTransform::new(10.0, 60.0, 0.01, -0.01),
            Crs::wgs84(),
        );
        match PixelArea::from_georeference(&georef).unwrap() {
            PixelArea::PerRow(rows) => {
                assert!(rows[0] < rows[1] && rows[1] < rows[2], "{:?}", rows);
            }
            other => panic!("expected per-row areas, got {:?}", other),
        }
    }

    #[test]
    fn test_rotated_geographic_matches_local_scale() {
        let mut gt = GeoTransform::new(0.0, 0.5, 0.001, -0.001);
        gt.col_rotation = 1.0e-9;
        let georef = Georeference::new(1, 1, gt, Crs::wgs84());
        let north_up = Georeference::new(
            1,
            1,
            GeoTransform::new(0.0, 0.5, 0.001, -0.001),
            Crs::wgs84(),
        );
        let rotated = PixelArea::from_georeference(&georef).unwrap().at(0, 0);
        let exact = PixelArea::from_georeference(&north_up).unwrap().at(0, 0);
        assert!((rotated - exact).abs() / exact < 1e-4, "{} vs {}", rotated, exact);
    }

    fn mercator_at_60n(rows: usize, cols: usize) -> Georeference {
        Georeference::new(
            rows,
            cols,
            GeoTransform::new(0.0, 8_399_737.89, 10.0, -10.0),
            Crs::projected_epsg(3857),
        )
    }

    #[test]
    fn test_web_mercator_pixels_measured_on_ellipsoid() {
        let (area, warning) =
            PixelArea::measure(&mercator_at_60n(3, 3), &AreaParams::default()).unwrap();
        // Mercator scale is sec(lat): a 10 m grid cell at 60°N covers ~5 m x 5 m
        let a = area.at(1, 1);
        assert!((a - 25.0).abs() / 25.0 < 0.02, "expected ~25 m², got {}", a);
        match warning {
            Some(DataQualityWarning::ProjectionDistortion {
                corrected,
                max_scale,
                ..
            }) => {
                assert!(corrected);
                assert!(max_scale < 0.26, "{}", max_scale);
            }
            other => panic!("expected ProjectionDistortion, got {:?}", other),
        }
    }

    #[test]
    fn test_planar_model_keeps_grid_area_but_flags_distortion() {
        let params = AreaParams {
            model: AreaModel::Planar,
            ..Default::default()
        };
        let (area, warning) = PixelArea::measure(&mercator_at_60n(2, 2), &params).unwrap();
        assert_eq!(area, PixelArea::Uniform(100.0));
        assert!(matches!(
            warning,
            Some(DataQualityWarning::ProjectionDistortion {
                corrected: false,
                ..
            })
        ));
    }

    #[test]
    fn test_utm_scale_within_tolerance() {
        let georef = utm_georef(4, 4);
        let (area, warning) = PixelArea::measure(&georef, &AreaParams::default()).unwrap();
        assert_eq!(area, PixelArea::Uniform(100.0));
        assert_eq!(warning, None);

        let ground = AreaParams {
            model: AreaModel::Ground,
            ..Default::default()
        };
        let (area, warning) = PixelArea::measure(&georef, &ground).unwrap();
        let a = area.at(3, 3);
        assert!((a - 100.0).abs() < 0.5, "UTM scale is close to 1, got {}", a);
        assert_eq!(warning, None);
    }

    #[test]
    fn test_unresolvable_crs_keeps_planar_area() {
        let crs = Crs {
            wkt: String::new(),
            epsg: None,
            geographic: false,
            linear_unit_m: 1.0,
        };
        let georef = Georeference::new(2, 2, GeoTransform::new(0.0, 0.0, 10.0, -10.0), crs);
        let (area, warning) = PixelArea::measure(&georef, &AreaParams::default()).unwrap();
        assert_eq!(area, PixelArea::Uniform(100.0));
        assert!(matches!(
            warning,
            Some(DataQualityWarning::AreaUnverified { .. })
        ));
    }

    #[test]
    fn test_geographic_grid_skips_projection_check() {
        let georef = Georeference::new(
            2,
            2,
            GeoTransform::new(10.0, 45.0, 0.001, -0.001),
            Crs::wgs84(),
        );
        let (area, warning) = PixelArea::measure(&georef, &AreaParams::default()).unwrap();
        assert!(matches!(area, PixelArea::PerRow(_)));
        assert_eq!(warning, None);
    }

    #[test]
    fn test_footprint_matches_band_area() {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let exact = ellipsoidal_band_area(45.0, 45.01, 0.01_f64.to_radians(), e2);
        let quad = footprint_area(&[5.0, 5.01, 5.01, 5.0], &[45.01, 45.01, 45.0, 45.0]);
        assert!((quad - exact).abs() / exact < 1e-6, "{} vs {}", quad, exact);
    }

    #[test]
    fn test_sample_positions_span_axis() {
        assert_eq!(sample_positions(1), vec![0]);
        assert_eq!(sample_positions(3), vec![0, 1, 2]);
        assert_eq!(sample_positions(101), vec![0, 25, 50, 75, 100]);
    }

    #[test]
    fn test_degenerate_transform_rejected() {
        let georef = Georeference::new(
            1,
            1,
            GeoTransform::new(0.0, 0.0, 0.0, -10.0),
            Crs::projected_epsg(32640),
        );
        assert!(matches!(
            PixelArea::from_georeference(&georef),
            Err(Error::Georeference(_))
        ));
    }
}

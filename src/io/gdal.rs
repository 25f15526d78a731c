use gdal::raster::ResampleAlg;
use gdal::{Dataset, Metadata};
use ndarray::{Array2, Zip};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::params::{QualityMask, QualityRule, SourceParams};
use crate::core::raster::{Crs, GeoTransform, Georeference, Raster};
use crate::core::scene::{Band, Scene};
use crate::error::{Error, Result};
use crate::types::BandRole;

/// Anything that can produce a multispectral [`Scene`] from a path
pub trait RasterSource {
    fn load(&self, path: &Path) -> Result<Scene>;
}

/// Summary of a GDAL-supported raster, as printed by `inspect`
#[derive(Debug, Clone, Serialize)]
pub struct RasterInfo {
    pub path: PathBuf,
    /// Width (pixels) of the raster
    pub size_x: usize,
    /// Height (lines) of the raster
    pub size_y: usize,
    /// Number of raster bands
    pub bands: usize,
    /// GDAL-order geotransform, `None` when the file carries none
    pub geotransform: Option<[f64; 6]>,
    /// `EPSG:xxxx` when known, otherwise the WKT (empty when absent)
    pub projection: String,
    pub geographic: bool,
    /// (min_x, min_y, max_x, max_y) in CRS units
    pub bounds: Option<(f64, f64, f64, f64)>,
    pub band_descriptions: Vec<String>,
    pub nodata: Vec<Option<f64>>,
    /// Dataset metadata (domain "")
    pub metadata: HashMap<String, String>,
}

// Helper to extract EPSG code from WKT authority tag
fn parse_epsg(wkt: &str) -> Option<u32> {
    if let Some(code) = wkt.strip_prefix("EPSG:") {
        return code.trim().parse().ok();
    }
    const KEY: &str = "AUTHORITY[\"EPSG\",\"";
    let idx = wkt.rfind(KEY)?;
    let start = idx + KEY.len();
    let end = wkt[start..].find('"')?;
    wkt[start..start + end].parse().ok()
}

/// Open dataset plus the bits of its header this crate needs
pub struct GdalReader {
    path: PathBuf,
    dataset: Dataset,
    size_x: usize,
    size_y: usize,
    bands: usize,
}

impl GdalReader {
    /// Open a GDAL-supported dataset (GeoTIFF, JP2, ENVI, ...)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        }
        let dataset = Dataset::open(path)?;
        let (size_x, size_y) = dataset.raster_size();
        let bands = dataset.raster_count() as usize;
        if bands == 0 {
            return Err(Error::Format(format!(
                "{}: no raster bands found",
                path.display()
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
            dataset,
            size_x,
            size_y,
            bands,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn band_count(&self) -> usize {
        self.bands
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.size_y, self.size_x)
    }

    /// Coordinate system of the dataset; fails when there is none
    pub fn crs(&self) -> Result<Crs> {
        let wkt = self.dataset.projection();
        if wkt.trim().is_empty() {
            return Err(Error::Georeference(format!(
                "{}: no coordinate reference system",
                self.path.display()
            )));
        }
        let (epsg, geographic, linear_unit_m) = match self.dataset.spatial_ref() {
            Ok(srs) => {
                let epsg = srs
                    .auth_code()
                    .ok()
                    .and_then(|c| u32::try_from(c).ok())
                    .or_else(|| parse_epsg(&wkt));
                let geographic = srs.is_geographic();
                let unit = if geographic { 1.0 } else { srs.linear_units() };
                (epsg, geographic, unit)
            }
            Err(e) => {
                debug!("spatial reference unavailable ({}), using WKT only", e);
                (parse_epsg(&wkt), wkt.trim_start().starts_with("GEOGCS"), 1.0)
            }
        };
        Ok(Crs {
            wkt,
            epsg,
            geographic,
            linear_unit_m,
        })
    }

    /// Full georeference; a missing or identity geotransform is an error
    pub fn georeference(&self) -> Result<Georeference> {
        let gt = self.dataset.geo_transform().map_err(|_| {
            Error::Georeference(format!("{}: no geotransform", self.path.display()))
        })?;
        let transform = GeoTransform::from_gdal(gt);
        if transform.is_identity() {
            return Err(Error::Georeference(format!(
                "{}: default geotransform, file is not georeferenced",
                self.path.display()
            )));
        }
        Ok(Georeference::new(
            self.size_y,
            self.size_x,
            transform,
            self.crs()?,
        ))
    }

    pub fn band_description(&self, index: usize) -> Result<String> {
        let band = self.dataset.rasterband(index)?;
        Ok(band.description()?)
    }

    pub fn band_nodata(&self, index: usize) -> Result<Option<f64>> {
        Ok(self.dataset.rasterband(index)?.no_data_value())
    }

    /// Read a single band (1-based index) as an f64 ndarray of shape (height, width)
    pub fn read_band(
        &self,
        index: usize,
        e_resample_alg: Option<ResampleAlg>,
    ) -> Result<Array2<f64>> {
        if index == 0 || index > self.bands {
            return Err(Error::Format(format!(
                "{}: band {} requested but file has {} band(s)",
                self.path.display(),
                index,
                self.bands
            )));
        }
        let band = self.dataset.rasterband(index)?;
        let window = (self.size_x, self.size_y);
        let buf = band.read_as::<f64>((0, 0), window, window, e_resample_alg)?;
        let data_vec = buf.data().to_vec();
        Array2::from_shape_vec((self.size_y, self.size_x), data_vec).map_err(|e| {
            Error::Format(format!(
                "{}: band {} has unexpected size: {}",
                self.path.display(),
                index,
                e
            ))
        })
    }

    pub fn info(&self) -> Result<RasterInfo> {
        let geotransform = self
            .dataset
            .geo_transform()
            .ok()
            .filter(|gt| !GeoTransform::from_gdal(*gt).is_identity());
        let bounds =
            geotransform.map(|gt| GeoTransform::from_gdal(gt).bounds(self.size_y, self.size_x));
        let (projection, geographic) = match self.crs() {
            Ok(crs) => {
                let p = match crs.epsg {
                    Some(code) => format!("EPSG:{}", code),
                    None => crs.wkt.clone(),
                };
                (p, crs.geographic)
            }
            Err(_) => (String::new(), false),
        };
        let mut band_descriptions = Vec::with_capacity(self.bands);
        let mut nodata = Vec::with_capacity(self.bands);
        for idx in 1..=self.bands {
            band_descriptions.push(self.band_description(idx)?);
            nodata.push(self.band_nodata(idx)?);
        }
        // Collect metadata entries (domain "")
        let mut metadata = HashMap::new();
        if let Some(entries) = self.dataset.metadata_domain("") {
            for entry in entries {
                if let Some((key, val)) = entry.split_once('=') {
                    metadata.insert(key.to_string(), val.to_string());
                }
            }
        }
        Ok(RasterInfo {
            path: self.path.clone(),
            size_x: self.size_x,
            size_y: self.size_y,
            bands: self.bands,
            geotransform,
            projection,
            geographic,
            bounds,
            band_descriptions,
            nodata,
            metadata,
        })
    }
}

/// Header summary of a raster file
pub fn describe(path: &Path) -> Result<RasterInfo> {
    GdalReader::open(path)?.info()
}

/// Read one band as a raster with validity from nodata and non-finite values.
/// No radiometric scaling is applied (used for categorical rasters).
pub fn read_single_band(path: &Path, band: usize) -> Result<Raster<f64>> {
    let reader = GdalReader::open(path)?;
    let georef = reader.georeference()?;
    let nodata = reader.band_nodata(band)?;
    let mut data = reader.read_band(band, None)?;
    let valid = data.mapv(|v| v.is_finite() && !is_nodata(v, nodata));
    data.zip_mut_with(&valid, |v, ok| {
        if !*ok {
            *v = f64::NAN;
        }
    });
    Raster::new(data, valid, georef)
}

#[inline]
fn is_nodata(v: f64, nodata: Option<f64>) -> bool {
    match nodata {
        Some(nd) if nd.is_nan() => v.is_nan(),
        Some(nd) => v == nd,
        None => false,
    }
}

/// Loads multispectral scenes through GDAL according to [`SourceParams`]
#[derive(Debug, Clone, Default)]
pub struct GdalRasterSource {
    params: SourceParams,
}

impl GdalRasterSource {
    pub fn new(params: SourceParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SourceParams {
        &self.params
    }

    /// Role -> 1-based band index for this file. Descriptions win over the
    /// configured layout when enabled; a band claimed by description is never
    /// also used for another role.
    fn resolve_layout(&self, reader: &GdalReader) -> Result<BTreeMap<BandRole, usize>> {
        let mut layout = self.params.layout.clone();
        if !self.params.match_descriptions {
            return Ok(layout);
        }
        let mut described = BTreeMap::new();
        for idx in 1..=reader.band_count() {
            if let Some(role) = BandRole::from_description(&reader.band_description(idx)?) {
                described.entry(role).or_insert(idx);
            }
        }
        if described.is_empty() {
            return Ok(layout);
        }
        debug!("band roles from descriptions: {:?}", described);
        layout.retain(|role, idx| {
            !described.contains_key(role) && !described.values().any(|claimed| claimed == idx)
        });
        layout.extend(described);
        Ok(layout)
    }

    fn read_band(
        &self,
        reader: &GdalReader,
        role: BandRole,
        index: usize,
        georef: &Georeference,
    ) -> Result<Band> {
        let nodata = match self.params.nodata {
            Some(nd) => Some(nd),
            None => reader.band_nodata(index)?,
        };
        let refl = &self.params.reflectance;
        let mut data = reader.read_band(index, None)?;
        let mut valid = Array2::from_elem(data.dim(), false);
        Zip::from(&mut data)
            .and(&mut valid)
            .for_each(|v, ok| {
                if v.is_finite() && !is_nodata(*v, nodata) {
                    let scaled = *v * refl.scale + refl.offset;
                    if scaled.is_finite() && scaled >= refl.valid_min && scaled <= refl.valid_max {
                        *v = scaled;
                        *ok = true;
                        return;
                    }
                }
                *v = f64::NAN;
            });
        let band = Band::new(role, Raster::new(data, valid, georef.clone())?);
        debug!(
            "{} <- band {} of {}: {} of {} pixels valid",
            role,
            index,
            reader.path().display(),
            band.raster.valid_count(),
            band.raster.len()
        );
        Ok(band)
    }

    fn read_quality(
        &self,
        scene_reader: &GdalReader,
        quality: &QualityMask,
        georef: &Georeference,
    ) -> Result<Array2<bool>> {
        let separate;
        let reader = match &quality.path {
            Some(path) => {
                separate = GdalReader::open(path)?;
                separate
                    .georeference()?
                    .ensure_matches(georef, "quality mask", "scene")?;
                &separate
            }
            None => scene_reader,
        };
        let values = reader.read_band(quality.band, None)?;
        let usable = values.mapv(|v| {
            v.is_finite()
                && match quality.rule {
                    QualityRule::Flag => v == 0.0,
                    QualityRule::Probability { max } => v <= max,
                }
        });
        let rejected = usable.iter().filter(|u| !**u).count();
        info!(
            "Quality mask rejects {} of {} pixels",
            rejected,
            usable.len()
        );
        Ok(usable)
    }
}

impl RasterSource for GdalRasterSource {
    fn load(&self, path: &Path) -> Result<Scene> {
        let reader = GdalReader::open(path)?;
        let georef = reader.georeference()?;
        let layout = self.resolve_layout(&reader)?;

        for role in &self.params.required {
            if !layout.contains_key(role) {
                return Err(Error::missing_band(*role, None));
            }
        }
        let wanted: Vec<(BandRole, usize)> = if self.params.required.is_empty() {
            layout.iter().map(|(r, i)| (*r, *i)).collect()
        } else {
            self.params
                .required
                .iter()
                .filter_map(|r| layout.get(r).map(|i| (*r, *i)))
                .collect()
        };

        let mut to_read = Vec::with_capacity(wanted.len());
        for (role, index) in wanted {
            if index == 0 || index > reader.band_count() {
                if self.params.required.contains(&role) {
                    return Err(Error::Format(format!(
                        "{}: {} mapped to band {} but file has {} band(s)",
                        path.display(),
                        role,
                        index,
                        reader.band_count()
                    )));
                }
                debug!("{} skipped: band {} not in file", role, index);
                continue;
            }
            to_read.push((role, index));
        }

        let (rows, cols) = reader.shape();
        let est_mb = (rows * cols * to_read.len() * (std::mem::size_of::<f64>() + 1)) as f64
            / (1024.0 * 1024.0);
        info!(
            "Loading {} band(s) from {} ({}x{}, {}), ~{:.1} MiB",
            to_read.len(),
            path.display(),
            rows,
            cols,
            georef.crs,
            est_mb
        );

        let mut scene = Scene::new(georef.clone());
        for (role, index) in to_read {
            scene = scene.with_band(self.read_band(&reader, role, index, &georef)?)?;
        }
        if let Some(quality) = &self.params.quality {
            scene = scene.with_quality_mask(self.read_quality(&reader, quality, &georef)?)?;
        }
        Ok(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_epsg_from_wkt_authority() {
        let wkt = r#"PROJCS["WGS 84 / UTM zone 40N",GEOGCS["WGS 84",AUTHORITY["EPSG","4326"]],AUTHORITY["EPSG","32640"]]"#;
        assert_eq!(parse_epsg(wkt), Some(32640));
        assert_eq!(parse_epsg("EPSG:4326"), Some(4326));
        assert_eq!(parse_epsg("LOCAL_CS[\"arbitrary\"]"), None);
    }

    #[test]
    fn test_nodata_matching() {
        assert!(is_nodata(0.0, Some(0.0)));
        assert!(is_nodata(f64::NAN, Some(f64::NAN)));
        assert!(!is_nodata(1.0, Some(0.0)));
        assert!(!is_nodata(0.0, None));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            GdalReader::open("/definitely/not/here.tif"),
            Err(Error::Io(_))
        ));
    }
}

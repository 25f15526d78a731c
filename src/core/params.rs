use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{AreaModel, BandRole, ChangeMode, SpectralIndex};

/// Radiometric normalisation applied to every band on load:
/// `reflectance = raw * scale + offset`, then range-checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectanceParams {
    pub scale: f64,
    pub offset: f64,
    /// Scaled values below this are marked invalid
    pub valid_min: f64,
    /// Scaled values above this are marked invalid
    pub valid_max: f64,
}

impl Default for ReflectanceParams {
    fn default() -> Self {
        // Sentinel-2 L2A surface reflectance digital numbers
        Self {
            scale: 1.0e-4,
            offset: 0.0,
            valid_min: 0.0,
            valid_max: 1.0,
        }
    }
}

/// How a quality layer marks pixels invalid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum QualityRule {
    /// Any non-zero value is cloud / bad data
    Flag,
    /// Values strictly above `max` are invalid (e.g. cloud probability in %)
    Probability { max: f64 },
}

/// Optional cloud / quality layer, in the scene file or a separate file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityMask {
    /// 1-based band index
    pub band: usize,
    /// Separate file holding the quality band; `None` means the scene file
    #[serde(default)]
    pub path: Option<PathBuf>,
    pub rule: QualityRule,
}

/// How bands of an input file are mapped and normalised
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceParams {
    /// Band role -> 1-based band index
    pub layout: BTreeMap<BandRole, usize>,
    /// Prefer band descriptions ("B4", "red") over `layout` when present
    pub match_descriptions: bool,
    pub reflectance: ReflectanceParams,
    /// Overrides the nodata value declared by the file
    pub nodata: Option<f64>,
    pub quality: Option<QualityMask>,
    /// Roles that must be present; checked at load time
    pub required: Vec<BandRole>,
}

impl SourceParams {
    /// Sentinel-2 export order: B2, B3, B4, B8, B11, B12
    pub fn sentinel2_layout() -> BTreeMap<BandRole, usize> {
        BandRole::ALL
            .iter()
            .enumerate()
            .map(|(i, role)| (*role, i + 1))
            .collect()
    }

    /// Require every band the given indices read
    pub fn require_for(mut self, indices: &[SpectralIndex]) -> Self {
        for idx in indices {
            for role in idx.required_bands() {
                if !self.required.contains(role) {
                    self.required.push(*role);
                }
            }
        }
        self
    }
}

impl Default for SourceParams {
    fn default() -> Self {
        Self {
            layout: Self::sentinel2_layout(),
            match_descriptions: true,
            reflectance: ReflectanceParams::default(),
            nodata: None,
            quality: None,
            required: Vec::new(),
        }
    }
}

/// EVI coefficients (MODIS defaults)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EviParams {
    pub gain: f64,
    pub c1: f64,
    pub c2: f64,
    pub l: f64,
}

impl Default for EviParams {
    fn default() -> Self {
        Self {
            gain: 2.5,
            c1: 6.0,
            c2: 7.5,
            l: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexParams {
    /// SAVI soil-brightness constant L
    pub soil_brightness: f64,
    pub evi: EviParams,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            soil_brightness: 0.5,
            evi: EviParams::default(),
        }
    }
}

/// Names used for the two epochs in logs and output file names
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EpochLabels {
    pub before: String,
    pub after: String,
}

impl Default for EpochLabels {
    fn default() -> Self {
        Self {
            before: "before".to_string(),
            after: "after".to_string(),
        }
    }
}

/// Pixel-area measurement on projected grids
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaParams {
    pub model: AreaModel,
    /// Largest acceptable |ground / planar - 1| before the grid counts as distorted
    pub distortion_tolerance: f64,
}

impl Default for AreaParams {
    fn default() -> Self {
        Self {
            model: AreaModel::Auto,
            distortion_tolerance: 0.005,
        }
    }
}

/// Change-detection run parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    pub indices: Vec<SpectralIndex>,
    /// Non-negative; |diff| equal to it counts as change
    pub threshold: f64,
    pub mode: ChangeMode,
    pub index_params: IndexParams,
    /// Rows per processing block; `None` processes whole rasters
    pub block_rows: Option<usize>,
    /// Acceptable invalid (nodata + cloud) share per epoch before a warning
    pub max_invalid_fraction: Option<f64>,
    pub labels: EpochLabels,
    pub area: AreaParams,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            indices: vec![SpectralIndex::Ndvi],
            threshold: 0.1,
            mode: ChangeMode::Binary,
            index_params: IndexParams::default(),
            block_rows: None,
            max_invalid_fraction: None,
            labels: EpochLabels::default(),
            area: AreaParams::default(),
        }
    }
}

impl PipelineParams {
    pub fn validate(&self) -> Result<()> {
        if self.indices.is_empty() {
            return Err(Error::InvalidArgument {
                arg: "indices",
                value: "[]".to_string(),
            });
        }
        validate_threshold(self.threshold)?;
        if let Some(0) = self.block_rows {
            return Err(Error::InvalidArgument {
                arg: "block_rows",
                value: "0".to_string(),
            });
        }
        if let Some(f) = self.max_invalid_fraction {
            if !(0.0..=1.0).contains(&f) {
                return Err(Error::InvalidArgument {
                    arg: "max_invalid_fraction",
                    value: f.to_string(),
                });
            }
        }
        let tol = self.area.distortion_tolerance;
        if !tol.is_finite() || tol < 0.0 {
            return Err(Error::InvalidArgument {
                arg: "distortion_tolerance",
                value: tol.to_string(),
            });
        }
        if self.labels.before == self.labels.after {
            return Err(Error::InvalidArgument {
                arg: "labels",
                value: self.labels.before.clone(),
            });
        }
        Ok(())
    }
}

pub(crate) fn validate_threshold(threshold: f64) -> Result<()> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(Error::InvalidArgument {
            arg: "threshold",
            value: threshold.to_string(),
        });
    }
    Ok(())
}

/// What gets written for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputParams {
    /// Float32 GeoTIFFs for indices/diff and a u8 mask GeoTIFF
    pub geotiff: bool,
    /// Colour JPEG quicklooks with world files
    pub quicklook: bool,
    /// Long side of quicklooks in pixels; `None` keeps raster size
    pub quicklook_size: Option<usize>,
}

impl Default for OutputParams {
    fn default() -> Self {
        Self {
            geotiff: true,
            quicklook: false,
            quicklook_size: None,
        }
    }
}

/// Full configuration, suitable for a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceParams,
    pub pipeline: PipelineParams,
    pub output: OutputParams,
}

impl Config {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.pipeline.validate()?;
        Ok(config)
    }
}

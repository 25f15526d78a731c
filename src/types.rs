//! Shared types and enums used across landshift.
//! Includes `BandRole`, `SpectralIndex`, `ChangeMode`, `AreaModel` and `ChangeClass`.
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Spectral role of a band, independent of the sensor's band numbering.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BandRole {
    Blue,
    Green,
    Red,
    Nir,
    Swir1,
    Swir2,
}

impl BandRole {
    pub const ALL: [BandRole; 6] = [
        BandRole::Blue,
        BandRole::Green,
        BandRole::Red,
        BandRole::Nir,
        BandRole::Swir1,
        BandRole::Swir2,
    ];

    /// Sentinel-2 band name for this role (B2, B3, B4, B8, B11, B12)
    pub fn sentinel2_name(&self) -> &'static str {
        match self {
            BandRole::Blue => "B2",
            BandRole::Green => "B3",
            BandRole::Red => "B4",
            BandRole::Nir => "B8",
            BandRole::Swir1 => "B11",
            BandRole::Swir2 => "B12",
        }
    }

    /// Match a free-form band description ("B4", "red", "NIR", "swir_1") to a role.
    pub fn from_description(desc: &str) -> Option<BandRole> {
        let norm: String = desc
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match norm.as_str() {
            "b2" | "b02" | "blue" => Some(BandRole::Blue),
            "b3" | "b03" | "green" => Some(BandRole::Green),
            "b4" | "b04" | "red" => Some(BandRole::Red),
            "b8" | "b08" | "nir" | "nearinfrared" => Some(BandRole::Nir),
            "b11" | "swir" | "swir1" | "swir16" => Some(BandRole::Swir1),
            "b12" | "swir2" | "swir22" => Some(BandRole::Swir2),
            _ => None,
        }
    }
}

impl std::fmt::Display for BandRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BandRole::Blue => "Blue",
            BandRole::Green => "Green",
            BandRole::Red => "Red",
            BandRole::Nir => "NIR",
            BandRole::Swir1 => "SWIR1",
            BandRole::Swir2 => "SWIR2",
        };
        write!(f, "{}", s)
    }
}

/// Supported spectral indices. Adding a variant forces every formula dispatch to
/// handle it.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SpectralIndex {
    /// Normalized Difference Vegetation Index
    Ndvi,
    /// Normalized Difference Water Index (McFeeters)
    Ndwi,
    /// Normalized Difference Built-up Index
    Ndbi,
    /// Soil Adjusted Vegetation Index
    Savi,
    /// Modified Soil Adjusted Vegetation Index (closed form)
    Msavi,
    /// Enhanced Vegetation Index
    Evi,
    /// Bare Soil Index
    Bsi,
}

impl SpectralIndex {
    pub const ALL: [SpectralIndex; 7] = [
        SpectralIndex::Ndvi,
        SpectralIndex::Ndwi,
        SpectralIndex::Ndbi,
        SpectralIndex::Savi,
        SpectralIndex::Msavi,
        SpectralIndex::Evi,
        SpectralIndex::Bsi,
    ];

    /// Bands the formula reads
    pub fn required_bands(&self) -> &'static [BandRole] {
        match self {
            SpectralIndex::Ndvi => &[BandRole::Nir, BandRole::Red],
            SpectralIndex::Ndwi => &[BandRole::Green, BandRole::Nir],
            SpectralIndex::Ndbi => &[BandRole::Swir1, BandRole::Nir],
            SpectralIndex::Savi => &[BandRole::Nir, BandRole::Red],
            SpectralIndex::Msavi => &[BandRole::Nir, BandRole::Red],
            SpectralIndex::Evi => &[BandRole::Nir, BandRole::Red, BandRole::Blue],
            SpectralIndex::Bsi => &[
                BandRole::Swir1,
                BandRole::Red,
                BandRole::Nir,
                BandRole::Blue,
            ],
        }
    }

    /// Output range that is validated (and clamped with a warning) for the pure
    /// normalized-difference indices. `None` means unbounded.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match self {
            SpectralIndex::Ndvi | SpectralIndex::Ndwi | SpectralIndex::Ndbi => Some((-1.0, 1.0)),
            SpectralIndex::Savi
            | SpectralIndex::Msavi
            | SpectralIndex::Evi
            | SpectralIndex::Bsi => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "ndvi",
            SpectralIndex::Ndwi => "ndwi",
            SpectralIndex::Ndbi => "ndbi",
            SpectralIndex::Savi => "savi",
            SpectralIndex::Msavi => "msavi",
            SpectralIndex::Evi => "evi",
            SpectralIndex::Bsi => "bsi",
        }
    }
}

impl std::fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_ascii_uppercase())
    }
}

impl FromStr for SpectralIndex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        SpectralIndex::ALL
            .iter()
            .copied()
            .find(|idx| idx.as_str() == needle)
            .ok_or_else(|| Error::UnknownIndex {
                name: s.to_string(),
                supported: SpectralIndex::ALL
                    .iter()
                    .map(|i| i.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// How the difference raster is classified
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ChangeMode {
    /// changed / unchanged on |diff|
    #[default]
    Binary,
    /// increase / decrease / unchanged on signed diff
    Signed,
}

impl std::fmt::Display for ChangeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeMode::Binary => write!(f, "binary"),
            ChangeMode::Signed => write!(f, "signed"),
        }
    }
}

/// How pixel area is measured on projected grids
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum AreaModel {
    /// Planar area unless the projection scale departs from 1 beyond the tolerance
    #[default]
    Auto,
    /// Geotransform area in CRS units; distortion is only reported
    Planar,
    /// Ellipsoidal area of every pixel footprint
    Ground,
}

impl std::fmt::Display for AreaModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AreaModel::Auto => write!(f, "auto"),
            AreaModel::Planar => write!(f, "planar"),
            AreaModel::Ground => write!(f, "ground"),
        }
    }
}

/// Per-pixel change category. The discriminants are the codes written to disk.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChangeClass {
    Invalid = 0,
    Unchanged = 1,
    Changed = 2,
    Increase = 3,
    Decrease = 4,
}

impl ChangeClass {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<ChangeClass> {
        match code {
            0 => Some(ChangeClass::Invalid),
            1 => Some(ChangeClass::Unchanged),
            2 => Some(ChangeClass::Changed),
            3 => Some(ChangeClass::Increase),
            4 => Some(ChangeClass::Decrease),
            _ => None,
        }
    }

    /// Any class that counts towards changed area
    pub fn is_change(self) -> bool {
        matches!(
            self,
            ChangeClass::Changed | ChangeClass::Increase | ChangeClass::Decrease
        )
    }
}

impl Default for ChangeClass {
    fn default() -> Self {
        ChangeClass::Invalid
    }
}

impl std::fmt::Display for ChangeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeClass::Invalid => "invalid",
            ChangeClass::Unchanged => "unchanged",
            ChangeClass::Changed => "changed",
            ChangeClass::Increase => "increase",
            ChangeClass::Decrease => "decrease",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_from_str_is_case_insensitive() {
        assert_eq!("NDVI".parse::<SpectralIndex>().unwrap(), SpectralIndex::Ndvi);
        assert_eq!(" msavi ".parse::<SpectralIndex>().unwrap(), SpectralIndex::Msavi);
    }

    #[test]
    fn test_unknown_index_is_typed_error() {
        match "ndxi".parse::<SpectralIndex>() {
            Err(Error::UnknownIndex { name, supported }) => {
                assert_eq!(name, "ndxi");
                assert!(supported.contains("ndvi"));
            }
            other => panic!("expected UnknownIndex, got {:?}", other),
        }
    }

    #[test]
    fn test_band_description_matching() {
        assert_eq!(BandRole::from_description("B4"), Some(BandRole::Red));
        assert_eq!(BandRole::from_description("B08"), Some(BandRole::Nir));
        assert_eq!(BandRole::from_description("SWIR_1"), Some(BandRole::Swir1));
        assert_eq!(BandRole::from_description("coastal"), None);
    }

    #[test]
    fn test_change_class_codes_round_trip() {
        for class in [
            ChangeClass::Invalid,
            ChangeClass::Unchanged,
            ChangeClass::Changed,
            ChangeClass::Increase,
            ChangeClass::Decrease,
        ] {
            assert_eq!(ChangeClass::from_code(class.code()), Some(class));
        }
        assert_eq!(ChangeClass::from_code(9), None);
    }
}

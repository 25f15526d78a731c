//! Non-fatal data-quality findings. These never abort a run; they travel with the
//! results and are logged when raised.
use serde::Serialize;
use tracing::warn;

use crate::types::SpectralIndex;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    /// Normalized-difference values fell outside [-1, 1] and were clamped
    ClampedValues {
        index: SpectralIndex,
        context: String,
        count: usize,
        /// Largest distance outside the valid range
        max_overshoot: f64,
    },
    /// Share of invalid pixels above the configured limit
    ExcessiveInvalid {
        context: String,
        invalid_fraction: f64,
        limit: f64,
    },
    NoValidPixels { context: String },
    /// Ground area per pixel departs from the planar geotransform area
    ProjectionDistortion {
        crs: String,
        /// Extremes of ground area / planar area
        min_scale: f64,
        max_scale: f64,
        /// Areas were measured on the ellipsoid rather than the grid
        corrected: bool,
    },
    /// Projection scale could not be checked; planar areas were used
    AreaUnverified { crs: String, reason: String },
}

impl DataQualityWarning {
    /// Log through `tracing` and hand the warning back for collection
    pub fn raise(self) -> Self {
        warn!("data quality: {}", self);
        self
    }
}

impl std::fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataQualityWarning::ClampedValues {
                index,
                context,
                count,
                max_overshoot,
            } => write!(
                f,
                "{} ({}): {} value(s) outside [-1, 1] clamped, worst overshoot {:.3e}",
                index, context, count, max_overshoot
            ),
            DataQualityWarning::ExcessiveInvalid {
                context,
                invalid_fraction,
                limit,
            } => write!(
                f,
                "{}: {:.1}% invalid pixels exceeds limit of {:.1}%",
                context,
                invalid_fraction * 100.0,
                limit * 100.0
            ),
            DataQualityWarning::NoValidPixels { context } => {
                write!(f, "{}: no valid pixels", context)
            }
            DataQualityWarning::ProjectionDistortion {
                crs,
                min_scale,
                max_scale,
                corrected,
            } => write!(
                f,
                "{}: ground/planar pixel area ranges {:.4}..{:.4}, {}",
                crs,
                min_scale,
                max_scale,
                if *corrected {
                    "using ellipsoidal areas"
                } else {
                    "planar areas kept"
                }
            ),
            DataQualityWarning::AreaUnverified { crs, reason } => {
                write!(f, "{}: projection scale not checked ({})", crs, reason)
            }
        }
    }
}

/// Warn when `invalid_fraction` exceeds `limit`; an entirely invalid raster is
/// reported as `NoValidPixels` instead.
pub fn check_invalid_fraction(
    context: &str,
    invalid_fraction: f64,
    limit: Option<f64>,
) -> Option<DataQualityWarning> {
    if invalid_fraction >= 1.0 {
        return Some(
            DataQualityWarning::NoValidPixels {
                context: context.to_string(),
            }
            .raise(),
        );
    }
    match limit {
        Some(limit) if invalid_fraction > limit => Some(
            DataQualityWarning::ExcessiveInvalid {
                context: context.to_string(),
                invalid_fraction,
                limit,
            }
            .raise(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_below_limit_is_silent() {
        assert_eq!(check_invalid_fraction("before", 0.05, Some(0.1)), None);
        assert_eq!(check_invalid_fraction("before", 0.5, None), None);
    }

    #[test]
    fn test_fraction_above_limit_warns() {
        let w = check_invalid_fraction("after", 0.4, Some(0.1)).unwrap();
        assert!(matches!(w, DataQualityWarning::ExcessiveInvalid { .. }));
        assert!(w.to_string().contains("40.0%"));
    }

    #[test]
    fn test_all_invalid_is_reported_even_without_limit() {
        let w = check_invalid_fraction("after", 1.0, None).unwrap();
        assert!(matches!(w, DataQualityWarning::NoValidPixels { .. }));
    }
}

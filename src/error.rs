//! Crate-level error type and `Result` alias.
//! Structural and precondition failures (format, georeference, geometry mismatch,
//! unknown index) are fatal and carry a named cause. Numeric edge cases never reach
//! this type: they mark pixels invalid instead (see `core::quality` for the
//! non-fatal warnings).
use thiserror::Error;

use crate::types::{BandRole, SpectralIndex};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Missing band {role} (index {index} needs {required})")]
    MissingBand {
        role: BandRole,
        index: String,
        required: String,
    },

    #[error("Georeference error: {0}")]
    Georeference(String),

    #[error("Geometry mismatch between {left} and {right}: {detail}")]
    GeometryMismatch {
        left: String,
        right: String,
        detail: String,
    },

    #[error("Unknown spectral index: {name}. Supported: {supported}")]
    UnknownIndex { name: String, supported: String },

    #[error("Cannot compare {left} against {right}")]
    IndexMismatch {
        left: SpectralIndex,
        right: SpectralIndex,
    },

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Render error: {0}")]
    Render(String),
}

impl Error {
    pub fn render<E: std::fmt::Display>(e: E) -> Self {
        Error::Render(e.to_string())
    }

    pub(crate) fn missing_band(role: BandRole, index: Option<SpectralIndex>) -> Self {
        let (index, required) = match index {
            Some(idx) => (
                idx.to_string(),
                idx.required_bands()
                    .iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join("+"),
            ),
            None => ("-".to_string(), role.to_string()),
        };
        Error::MissingBand {
            role,
            index,
            required,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}

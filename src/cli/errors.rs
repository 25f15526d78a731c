use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid size parameter: {size}. Must be a positive integer or 'original'")]
    InvalidSize { size: String },

    #[error("Size must be greater than 0, got: {size}")]
    ZeroSize { size: usize },

    #[error("{names} class name(s) given for {classes} class code(s)")]
    ClassNameCount { classes: usize, names: usize },

    #[error("Nothing to write: both GeoTIFF and quicklook outputs are disabled")]
    NoOutputs,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

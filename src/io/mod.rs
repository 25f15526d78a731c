//! I/O layer for GDAL-backed rasters.
//! Provides the `gdal` scene reader and `writers` for GeoTIFF/JPEG outputs and
//! metadata embedding/sidecars.
pub mod gdal;
pub use gdal::{GdalRasterSource, GdalReader, RasterInfo, RasterSource, describe, read_single_band};

pub mod writers;

//! Output writers: GeoTIFF (float32 / u8), colour JPEG, world files and
//! metadata embedding / JSON sidecars.
pub mod jpeg;
pub mod metadata;
pub mod tiff;
pub mod worldfile;

//! Core building blocks: georeferenced rasters, scenes, spectral indices, change
//! detection, area aggregation and class transitions. These are pure in-memory
//! primitives consumed by the high-level `api` module.
pub mod area;
pub mod change;
pub mod indices;
pub mod params;
pub mod quality;
pub mod raster;
pub mod scene;
pub mod tiling;
pub mod transitions;

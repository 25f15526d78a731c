#![doc = r#"
LANDSHIFT: two-epoch land-cover change detection from multispectral rasters.

This crate turns two co-registered captures of the same area (e.g. Sentinel-2 L2A
exports) into spectral index rasters, a temporal difference, a thresholded change
mask and CRS-aware area statistics. It powers the `landshift` CLI and can be
embedded in your own Rust applications.

Pipeline
--------
`RasterSource` (GDAL) → `IndexEngine` (NDVI, NDWI, NDBI, SAVI, MSAVI, EVI, BSI)
→ change detection (binary or signed, inclusive threshold) → area aggregation
→ `ReportRenderer`s (GeoTIFF, JPEG quicklooks) and `report.json`.

Invalid pixels (nodata, cloud, out-of-range reflectance, zero denominators) are
tracked by a validity mask on every raster and never count as change. Pixel areas
follow the ellipsoid on geographic grids; on projected grids the projection scale
is checked through GDAL and distorted grids (e.g. Web Mercator) are flagged and
measured per pixel.

Requirements
------------
- GDAL development headers and runtime available on your system.
- Rust 2024 edition toolchain.

Quick start: two files to an output directory
---------------------------------------------
```rust,no_run
use std::path::Path;
use landshift::api::{process_pair_to_dir, renderers_for};
use landshift::render::ReportRenderer;
use landshift::{ChangeMode, Config, SpectralIndex};

fn main() -> landshift::Result<()> {
    let mut config = Config::default();
    config.pipeline.indices = vec![SpectralIndex::Ndvi, SpectralIndex::Ndbi];
    config.pipeline.threshold = 0.2;
    config.pipeline.mode = ChangeMode::Signed;
    config.output.quicklook = true;
    config.output.quicklook_size = Some(1024);

    let renderers = renderers_for(&config.output);
    let renderers: Vec<&dyn ReportRenderer> = renderers.iter().map(|r| r.as_ref()).collect();
    let (report, _summary) = process_pair_to_dir(
        Path::new("/data/2019.tif"),
        Path::new("/data/2024.tif"),
        Path::new("/out"),
        &config,
        &renderers,
    )?;

    for change in &report.changes {
        println!("{}: {:.3} km² changed", change.index, change.area.changed_area_km2);
    }
    Ok(())
}
```

In-memory scenes
----------------
```rust
use ndarray::Array2;
use landshift::core::raster::{Crs, GeoTransform, Georeference, Raster};
use landshift::core::scene::{Band, Scene};
use landshift::{BandRole, PipelineParams, SpectralIndex, run_change_detection};

fn scene(nir: f64, red: f64) -> landshift::Result<Scene> {
    let georef = Georeference::new(
        10,
        10,
        GeoTransform::new(300_000.0, 2_710_000.0, 10.0, -10.0),
        Crs::projected_epsg(32640),
    );
    let band = |v: f64| Raster::from_data(Array2::from_elem((10, 10), v), georef.clone());
    Scene::new(georef.clone())
        .with_band(Band::new(BandRole::Nir, band(nir)?))?
        .with_band(Band::new(BandRole::Red, band(red)?))
}

fn main() -> landshift::Result<()> {
    let params = PipelineParams {
        indices: vec![SpectralIndex::Ndvi],
        threshold: 0.2,
        ..Default::default()
    };
    let report = run_change_detection(&scene(0.5, 0.2)?, &scene(0.3, 0.2)?, &params)?;
    let area = &report.changes[0].area;
    assert_eq!(area.changed_pixels, 100);
    assert!((area.changed_area_km2 - 0.01).abs() < 1e-12);
    Ok(())
}
```

Error handling
--------------
All public functions return `landshift::Result<T>`; match on `landshift::Error` to
handle specific cases. Data-quality findings that do not stop a run (clamped
values, heavy cloud cover, projection distortion) are returned as `DataQualityWarning`s and logged
through `tracing`.

```rust,no_run
use std::path::Path;
use landshift::api::detect_change_between_paths;
use landshift::{Error, PipelineParams, SourceParams};

fn main() {
    let res = detect_change_between_paths(
        Path::new("/data/a.tif"),
        Path::new("/data/b.tif"),
        &SourceParams::default(),
        &PipelineParams::default(),
    );
    match res {
        Ok(report) => println!("{} index(es) compared", report.changes.len()),
        Err(Error::GeometryMismatch { detail, .. }) => eprintln!("not co-registered: {detail}"),
        Err(Error::MissingBand { role, .. }) => eprintln!("missing {role} band"),
        Err(other) => eprintln!("error: {other}"),
    }
}
```

Useful modules
--------------
- [`api`]: high-level, ergonomic entry points.
- [`core`]: rasters, scenes, index maths, change detection, area and transitions.
- [`types`]: band roles, spectral indices and change classes.
- [`io`]: GDAL reading and GeoTIFF/JPEG writers.
- [`render`]: report renderers, colormaps and quicklook resizing.
- [`error`]: crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod render;
pub mod types;

// Curated public API surface
// Types
pub use crate::core::params::{
    AreaParams, Config, IndexParams, OutputParams, PipelineParams, SourceParams,
};
pub use crate::core::quality::DataQualityWarning;
pub use error::{Error, Result};
pub use types::{AreaModel, BandRole, ChangeClass, ChangeMode, SpectralIndex};

// Core operations
pub use crate::core::area::{AreaStats, PixelArea, aggregate_area};
pub use crate::core::change::{ChangeMask, ChangeResult, DiffRaster, detect_change};
pub use crate::core::indices::{IndexEngine, IndexRaster, compute_index};
pub use crate::core::transitions::{LandCoverClass, TransitionMatrix, transition_matrix};

// Readers and renderers
pub use io::gdal::{GdalRasterSource, GdalReader, RasterSource};
pub use render::{GeoTiffRenderer, QuicklookRenderer, ReportRenderer};

// High-level API re-exports
pub use api::{
    ChangeReport, ReportSummary, detect_change_between_paths, process_pair_to_dir,
    render_report, run_change_detection,
};

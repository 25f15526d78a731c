//! High-level, ergonomic library API: run change detection on in-memory scenes or
//! straight from files, render results to a directory, build index stacks and
//! class transition matrices. Prefer these entrypoints over the low-level `core`
//! modules when integrating landshift.
use std::path::{Path, PathBuf};

use chrono::Utc;
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::core::area::{AreaStats, PixelArea, aggregate_area};
use crate::core::change::{ChangeMask, DiffRaster, detect};
use crate::core::indices::{IndexEngine, IndexRaster};
use crate::core::params::{Config, IndexParams, OutputParams, PipelineParams, SourceParams};
use crate::core::quality::{DataQualityWarning, check_invalid_fraction};
use crate::core::raster::Georeference;
use crate::core::scene::Scene;
use crate::core::transitions::{LandCoverClass, TransitionMatrix, transition_matrix};
use crate::error::{Error, Result};
use crate::io::gdal::{GdalRasterSource, RasterSource, read_single_band};
use crate::io::writers::metadata::{embed_tiff_metadata, provenance_fields};
use crate::io::writers::tiff::{FLOAT_NODATA, TiffBand, to_f32_with_nodata, write_tiff};
use crate::render::{GeoTiffRenderer, QuicklookRenderer, ReportRenderer};
use crate::types::{AreaModel, ChangeMode, SpectralIndex};

/// Everything computed for one spectral index
#[derive(Debug, Clone)]
pub struct IndexChange {
    pub index: SpectralIndex,
    pub before: IndexRaster,
    pub after: IndexRaster,
    pub diff: DiffRaster,
    pub mask: ChangeMask,
    pub area: AreaStats,
    /// Warnings raised while computing this index
    pub warnings: Vec<DataQualityWarning>,
}

/// Validity summary of one input scene
#[derive(Debug, Clone, Serialize)]
pub struct EpochSummary {
    pub label: String,
    pub total_pixels: usize,
    pub invalid_pixels: usize,
    pub invalid_fraction: f64,
}

impl EpochSummary {
    fn of(label: &str, scene: &Scene) -> Self {
        let mask = scene.valid_mask();
        let invalid = mask.iter().filter(|v| !**v).count();
        Self {
            label: label.to_string(),
            total_pixels: mask.len(),
            invalid_pixels: invalid,
            invalid_fraction: scene.invalid_fraction(),
        }
    }
}

/// Result of a two-epoch run over one or more indices
#[derive(Debug, Clone)]
pub struct ChangeReport {
    pub georef: Georeference,
    pub params: PipelineParams,
    pub before: EpochSummary,
    pub after: EpochSummary,
    /// One entry per requested index, in request order
    pub changes: Vec<IndexChange>,
    /// Scene-level warnings (e.g. excessive cloud); per-index ones live on `changes`
    pub warnings: Vec<DataQualityWarning>,
}

impl ChangeReport {
    pub fn change(&self, index: SpectralIndex) -> Option<&IndexChange> {
        self.changes.iter().find(|c| c.index == index)
    }

    /// Scene-level and per-index warnings together
    pub fn all_warnings(&self) -> Vec<&DataQualityWarning> {
        self.warnings
            .iter()
            .chain(self.changes.iter().flat_map(|c| c.warnings.iter()))
            .collect()
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            tool: "landshift",
            version: env!("CARGO_PKG_VERSION"),
            generated_at: Utc::now().to_rfc3339(),
            crs: self.georef.crs.identifier(),
            geotransform: self.georef.transform.to_gdal(),
            rows: self.georef.rows,
            cols: self.georef.cols,
            threshold: self.params.threshold,
            mode: self.params.mode,
            area_model: self.params.area.model,
            before: self.before.clone(),
            after: self.after.clone(),
            indices: self
                .changes
                .iter()
                .map(|c| IndexSummary {
                    index: c.index,
                    area: c.area.clone(),
                    warnings: c.warnings.clone(),
                })
                .collect(),
            warnings: self.warnings.clone(),
            files: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub index: SpectralIndex,
    pub area: AreaStats,
    pub warnings: Vec<DataQualityWarning>,
}

/// Serializable digest of a [`ChangeReport`], written as `report.json`
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub tool: &'static str,
    pub version: &'static str,
    pub generated_at: String,
    pub crs: String,
    pub geotransform: [f64; 6],
    pub rows: usize,
    pub cols: usize,
    pub threshold: f64,
    pub mode: ChangeMode,
    pub area_model: AreaModel,
    pub before: EpochSummary,
    pub after: EpochSummary,
    pub indices: Vec<IndexSummary>,
    pub warnings: Vec<DataQualityWarning>,
    pub files: Vec<PathBuf>,
}

fn dedup_indices(indices: &[SpectralIndex]) -> Vec<SpectralIndex> {
    let mut out = Vec::with_capacity(indices.len());
    for idx in indices {
        if !out.contains(idx) {
            out.push(*idx);
        }
    }
    out
}

/// Run change detection between two in-memory scenes.
///
/// Geometry and band availability are checked for every index before any pixel
/// is computed; indices are then processed in parallel.
pub fn run_change_detection(
    before: &Scene,
    after: &Scene,
    params: &PipelineParams,
) -> Result<ChangeReport> {
    params.validate()?;
    let labels = &params.labels;
    before
        .georef()
        .ensure_matches(after.georef(), &labels.before, &labels.after)?;
    let indices = dedup_indices(&params.indices);
    for idx in &indices {
        before.ensure_bands_for(*idx)?;
        after.ensure_bands_for(*idx)?;
    }

    let before_summary = EpochSummary::of(&labels.before, before);
    let after_summary = EpochSummary::of(&labels.after, after);
    let mut warnings: Vec<DataQualityWarning> = [&before_summary, &after_summary]
        .iter()
        .filter_map(|s| {
            check_invalid_fraction(&s.label, s.invalid_fraction, params.max_invalid_fraction)
        })
        .collect();

    let (pixel_area, area_warning) = PixelArea::measure(before.georef(), &params.area)?;
    warnings.extend(area_warning);
    let engine = IndexEngine::new(params.index_params).with_block_rows(params.block_rows);
    info!(
        "Running change detection for {} index(es) on {}x{} ({})",
        indices.len(),
        before.georef().rows,
        before.georef().cols,
        before.georef().crs
    );

    let changes = indices
        .par_iter()
        .map(|idx| -> Result<IndexChange> {
            let a = engine.compute_for(*idx, before, &labels.before)?;
            let b = engine.compute_for(*idx, after, &labels.after)?;
            let result = detect(
                &a.raster,
                &b.raster,
                params.threshold,
                params.mode,
                params.block_rows,
            )?;
            let area = aggregate_area(&result.mask, &pixel_area)?;
            info!(
                "{}: {} changed pixel(s), {:.4} km²",
                idx, area.changed_pixels, area.changed_area_km2
            );
            let mut warnings = a.warnings;
            warnings.extend(b.warnings);
            Ok(IndexChange {
                index: *idx,
                before: a.raster,
                after: b.raster,
                diff: result.diff,
                mask: result.mask,
                area,
                warnings,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ChangeReport {
        georef: before.georef().clone(),
        params: params.clone(),
        before: before_summary,
        after: after_summary,
        changes,
        warnings,
    })
}

/// Load both epochs through GDAL and run change detection
pub fn detect_change_between_paths(
    before: &Path,
    after: &Path,
    source: &SourceParams,
    params: &PipelineParams,
) -> Result<ChangeReport> {
    params.validate()?;
    let reader = GdalRasterSource::new(source.clone().require_for(&params.indices));
    let scene_a = reader.load(before)?;
    let scene_b = reader.load(after)?;
    run_change_detection(&scene_a, &scene_b, params)
}

/// Renderers enabled by the output settings
pub fn renderers_for(output: &OutputParams) -> Vec<Box<dyn ReportRenderer>> {
    let mut out: Vec<Box<dyn ReportRenderer>> = Vec::new();
    if output.geotiff {
        out.push(Box::new(GeoTiffRenderer));
    }
    if output.quicklook {
        out.push(Box::new(QuicklookRenderer::new(output.quicklook_size)));
    }
    out
}

/// Render every index of `report` with every renderer and write `report.json`.
/// Returns the summary including all written paths.
pub fn render_report(
    report: &ChangeReport,
    out_dir: &Path,
    renderers: &[&dyn ReportRenderer],
) -> Result<ReportSummary> {
    std::fs::create_dir_all(out_dir)?;
    let mut summary = report.summary();
    for change in &report.changes {
        for renderer in renderers {
            let files = renderer.render(change, &report.params.labels, out_dir)?;
            info!(
                "{} renderer wrote {} file(s) for {}",
                renderer.name(),
                files.len(),
                change.index
            );
            summary.files.extend(files);
        }
    }
    let report_path = out_dir.join("report.json");
    summary.files.push(report_path.clone());
    std::fs::write(&report_path, serde_json::to_string_pretty(&summary)?)?;
    info!("Report written to {:?}", report_path);
    Ok(summary)
}

/// Full run from two files to an output directory
pub fn process_pair_to_dir(
    before: &Path,
    after: &Path,
    out_dir: &Path,
    config: &Config,
    renderers: &[&dyn ReportRenderer],
) -> Result<(ChangeReport, ReportSummary)> {
    let report = detect_change_between_paths(before, after, &config.source, &config.pipeline)?;
    let summary = render_report(&report, out_dir, renderers)?;
    Ok((report, summary))
}

/// Several indices of one scene on a shared grid
#[derive(Debug, Clone)]
pub struct IndexStack {
    pub georef: Georeference,
    pub rasters: Vec<IndexRaster>,
    pub warnings: Vec<DataQualityWarning>,
}

pub fn compute_index_stack(
    scene: &Scene,
    indices: &[SpectralIndex],
    params: &IndexParams,
    block_rows: Option<usize>,
) -> Result<IndexStack> {
    let indices = dedup_indices(indices);
    if indices.is_empty() {
        return Err(Error::InvalidArgument {
            arg: "indices",
            value: "[]".to_string(),
        });
    }
    for idx in &indices {
        scene.ensure_bands_for(*idx)?;
    }
    let engine = IndexEngine::new(*params).with_block_rows(block_rows);
    let outputs = indices
        .par_iter()
        .map(|idx| engine.compute(*idx, scene))
        .collect::<Result<Vec<_>>>()?;
    let mut rasters = Vec::with_capacity(outputs.len());
    let mut warnings = Vec::new();
    for out in outputs {
        rasters.push(out.raster);
        warnings.extend(out.warnings);
    }
    Ok(IndexStack {
        georef: scene.georef().clone(),
        rasters,
        warnings,
    })
}

/// One float32 GeoTIFF band per index, described by index name, nodata -9999
pub fn write_index_stack(stack: &IndexStack, output: &Path) -> Result<PathBuf> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let data: Vec<Vec<f32>> = stack
        .rasters
        .iter()
        .map(|r| to_f32_with_nodata(r.raster(), FLOAT_NODATA))
        .collect();
    let names: Vec<String> = stack.rasters.iter().map(|r| r.index().to_string()).collect();
    let bands: Vec<TiffBand<'_, f32>> = data
        .iter()
        .zip(names.iter())
        .map(|(d, n)| TiffBand {
            data: d,
            description: n,
        })
        .collect();
    let mut ds = write_tiff(
        output,
        stack.georef.cols,
        stack.georef.rows,
        &bands,
        Some(FLOAT_NODATA),
    )?;
    let fields = provenance_fields([("INDICES", names.join(","))]);
    embed_tiff_metadata(&mut ds, &stack.georef, &fields)?;
    info!("Index stack ({}) written to {:?}", names.join(", "), output);
    Ok(output.to_path_buf())
}

/// Load a scene, compute `indices` and write them as one multi-band GeoTIFF
pub fn index_stack_to_path(
    input: &Path,
    output: &Path,
    source: &SourceParams,
    indices: &[SpectralIndex],
    params: &IndexParams,
) -> Result<IndexStack> {
    let reader = GdalRasterSource::new(source.clone().require_for(indices));
    let scene = reader.load(input)?;
    let stack = compute_index_stack(&scene, indices, params, None)?;
    write_index_stack(&stack, output)?;
    Ok(stack)
}

/// Transition matrix between the first bands of two classification rasters
pub fn transitions_between_paths(
    before: &Path,
    after: &Path,
    classes: &[LandCoverClass],
) -> Result<TransitionMatrix> {
    let a = read_single_band(before, 1)?;
    let b = read_single_band(after, 1)?;
    transition_matrix(&a, &b, classes)
}


//! Output sinks for change results.
//!
//! A [`ReportRenderer`] turns one index's results into files. Two are bundled:
//! [`GeoTiffRenderer`] for analysis-ready GeoTIFFs and [`QuicklookRenderer`] for
//! colour JPEG previews that still open georeferenced in GIS tools.
pub mod colormap;
pub mod resize;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::api::IndexChange;
use crate::core::params::EpochLabels;
use crate::core::raster::{Georeference, Raster};
use crate::error::Result;
use crate::io::writers::jpeg::write_rgb_jpeg;
use crate::io::writers::metadata::{
    create_metadata_sidecar, embed_tiff_metadata, provenance_fields,
};
use crate::io::writers::tiff::{write_tiff_f32, write_tiff_u8};
use crate::io::writers::worldfile::{write_prj_file, write_world_file};
use crate::types::ChangeClass;
use colormap::{Colormap, Stretch, colorize, colorize_mask};
use resize::resize_rgb_with_transform;

pub trait ReportRenderer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Write every artifact for `change` into `out_dir`, returning the paths written
    fn render(
        &self,
        change: &IndexChange,
        labels: &EpochLabels,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>>;
}

/// Base file names (no extension) of the four artifacts of one index
pub struct ArtifactNames {
    pub before: String,
    pub after: String,
    pub diff: String,
    pub mask: String,
}

impl ArtifactNames {
    pub fn new(change: &IndexChange, labels: &EpochLabels) -> Self {
        let idx = change.index.as_str();
        Self {
            before: format!("{}_{}", idx, labels.before),
            after: format!("{}_{}", idx, labels.after),
            diff: format!("{}_diff", idx),
            mask: format!("{}_change_mask", idx),
        }
    }
}

fn artifact_fields(
    change: &IndexChange,
    artifact: &str,
    extra: &[(&str, String)],
) -> BTreeMap<String, String> {
    let mut fields = vec![
        ("INDEX", change.index.to_string()),
        ("ARTIFACT", artifact.to_string()),
    ];
    fields.extend(extra.iter().cloned());
    provenance_fields(fields)
}

fn change_fields(change: &IndexChange) -> Vec<(&'static str, String)> {
    vec![
        ("THRESHOLD", change.mask.threshold.to_string()),
        ("CHANGE_MODE", change.mask.mode.to_string()),
    ]
}

/// Float32 GeoTIFFs for both index rasters and the diff (nodata -9999) and a u8
/// GeoTIFF of the change codes (nodata 0).
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffRenderer;

impl GeoTiffRenderer {
    fn float(
        &self,
        path: PathBuf,
        raster: &Raster<f64>,
        description: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<PathBuf> {
        let mut ds = write_tiff_f32(&path, raster, description)?;
        embed_tiff_metadata(&mut ds, raster.georef(), fields)?;
        Ok(path)
    }
}

impl ReportRenderer for GeoTiffRenderer {
    fn name(&self) -> &'static str {
        "geotiff"
    }

    fn render(
        &self,
        change: &IndexChange,
        labels: &EpochLabels,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let names = ArtifactNames::new(change, labels);
        let mut written = Vec::with_capacity(4);

        for (name, raster, epoch) in [
            (&names.before, change.before.raster(), &labels.before),
            (&names.after, change.after.raster(), &labels.after),
        ] {
            let fields = artifact_fields(change, "index", &[("EPOCH", epoch.clone())]);
            written.push(self.float(
                out_dir.join(format!("{}.tif", name)),
                raster,
                &format!("{} {}", change.index, epoch),
                &fields,
            )?);
        }

        let diff_fields = artifact_fields(
            change,
            "diff",
            &[("DIFF", format!("{} - {}", labels.after, labels.before))],
        );
        written.push(self.float(
            out_dir.join(format!("{}.tif", names.diff)),
            &change.diff.raster,
            &format!("{} difference", change.index),
            &diff_fields,
        )?);

        let mask_path = out_dir.join(format!("{}.tif", names.mask));
        let (rows, cols) = change.mask.raster.shape();
        let codes = change.mask.codes();
        let codes: Vec<u8> = codes.iter().copied().collect();
        let mut ds = write_tiff_u8(
            &mask_path,
            cols,
            rows,
            &codes,
            Some(ChangeClass::Invalid.code() as f64),
            "change class",
        )?;
        let mut mask_extra = change_fields(change);
        mask_extra.push((
            "CLASS_CODES",
            "0=invalid,1=unchanged,2=changed,3=increase,4=decrease".to_string(),
        ));
        embed_tiff_metadata(
            &mut ds,
            change.mask.georef(),
            &artifact_fields(change, "change_mask", &mask_extra),
        )?;
        written.push(mask_path);

        info!("GeoTIFF outputs for {} written to {:?}", change.index, out_dir);
        Ok(written)
    }
}

/// Colour JPEG previews with world file, `.prj` and JSON sidecar
#[derive(Debug, Clone, Copy, Default)]
pub struct QuicklookRenderer {
    /// Long side in pixels; `None` keeps the raster size
    pub size: Option<usize>,
}

impl QuicklookRenderer {
    pub fn new(size: Option<usize>) -> Self {
        Self { size }
    }

    fn write(
        &self,
        path: PathBuf,
        rgb: Vec<u8>,
        georef: &Georeference,
        smooth: bool,
        fields: &BTreeMap<String, String>,
    ) -> Result<Vec<PathBuf>> {
        let (cols, rows, rgb, gt) = resize_rgb_with_transform(
            rgb,
            georef.cols,
            georef.rows,
            self.size,
            &georef.transform,
            smooth,
        )?;
        write_rgb_jpeg(&path, cols, rows, &rgb)?;
        let world = write_world_file(&path, &gt)?;
        let prj = write_prj_file(&path, &georef.crs)?;
        let sidecar = create_metadata_sidecar(&path, &gt, &georef.crs, fields)?;
        Ok(vec![path, world, prj, sidecar])
    }
}

impl ReportRenderer for QuicklookRenderer {
    fn name(&self) -> &'static str {
        "quicklook"
    }

    fn render(
        &self,
        change: &IndexChange,
        labels: &EpochLabels,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let names = ArtifactNames::new(change, labels);
        let colormap = Colormap::for_index(change.index);
        let mut written = Vec::new();

        for (name, raster, epoch) in [
            (&names.before, change.before.raster(), &labels.before),
            (&names.after, change.after.raster(), &labels.after),
        ] {
            let stretch = Stretch::for_index(change.index, raster);
            let fields = artifact_fields(
                change,
                "index",
                &[
                    ("EPOCH", epoch.clone()),
                    ("STRETCH_MIN", stretch.min.to_string()),
                    ("STRETCH_MAX", stretch.max.to_string()),
                ],
            );
            written.extend(self.write(
                out_dir.join(format!("{}.jpg", name)),
                colorize(raster, colormap, stretch),
                raster.georef(),
                true,
                &fields,
            )?);
        }

        let diff = &change.diff.raster;
        let stretch = Stretch::symmetric(diff);
        let fields = artifact_fields(
            change,
            "diff",
            &[
                ("STRETCH_MIN", stretch.min.to_string()),
                ("STRETCH_MAX", stretch.max.to_string()),
            ],
        );
        written.extend(self.write(
            out_dir.join(format!("{}.jpg", names.diff)),
            colorize(diff, Colormap::Bwr, stretch),
            diff.georef(),
            true,
            &fields,
        )?);

        let mask = &change.mask.raster;
        written.extend(self.write(
            out_dir.join(format!("{}.jpg", names.mask)),
            colorize_mask(mask),
            mask.georef(),
            false,
            &artifact_fields(change, "change_mask", &change_fields(change)),
        )?);

        info!("Quicklooks for {} written to {:?}", change.index, out_dir);
        Ok(written)
    }
}

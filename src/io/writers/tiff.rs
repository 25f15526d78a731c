use gdal::Dataset;
use gdal::DriverManager;
use gdal::Metadata;
use gdal::raster::{Buffer, ColorInterpretation, GdalType};
use std::path::Path;

use crate::core::raster::Raster;
use crate::error::{Error, Result};

/// Nodata value of float outputs (index, diff and stack rasters)
pub const FLOAT_NODATA: f64 = -9999.0;

/// One band of a GeoTIFF to be written, row-major
pub struct TiffBand<'a, T> {
    pub data: &'a [T],
    pub description: &'a str,
}

/// Create a GeoTIFF with one band per entry. The caller embeds georeference and
/// metadata on the returned dataset; it is flushed when dropped.
pub fn write_tiff<T: GdalType + Copy>(
    output: &Path,
    cols: usize,
    rows: usize,
    bands: &[TiffBand<'_, T>],
    nodata: Option<f64>,
) -> Result<Dataset> {
    if bands.is_empty() {
        return Err(Error::Render(format!(
            "{}: no bands to write",
            output.display()
        )));
    }
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let ds = driver.create_with_band_type::<T, _>(output, cols, rows, bands.len())?;
    for (i, band) in bands.iter().enumerate() {
        if band.data.len() != cols * rows {
            return Err(Error::Render(format!(
                "{}: band {} holds {} samples, expected {}",
                output.display(),
                i + 1,
                band.data.len(),
                cols * rows
            )));
        }
        let mut handle = ds.rasterband(i + 1)?;
        handle.set_color_interpretation(ColorInterpretation::GrayIndex)?;
        if let Some(nd) = nodata {
            handle.set_no_data_value(Some(nd))?;
        }
        if !band.description.is_empty() {
            handle.set_description(band.description)?;
        }
        let mut buf = Buffer::new((cols, rows), band.data.to_vec());
        handle.write((0, 0), (cols, rows), &mut buf)?;
    }
    Ok(ds)
}

/// Float32 samples with invalid pixels replaced by `nodata`
pub fn to_f32_with_nodata(raster: &Raster<f64>, nodata: f64) -> Vec<f32> {
    raster
        .data()
        .iter()
        .zip(raster.valid_mask().iter())
        .map(|(v, ok)| if *ok { *v as f32 } else { nodata as f32 })
        .collect()
}

/// Single-band float32 GeoTIFF of a raster, nodata `FLOAT_NODATA`
pub fn write_tiff_f32(output: &Path, raster: &Raster<f64>, description: &str) -> Result<Dataset> {
    let (rows, cols) = raster.shape();
    let data = to_f32_with_nodata(raster, FLOAT_NODATA);
    write_tiff(
        output,
        cols,
        rows,
        &[TiffBand {
            data: &data,
            description,
        }],
        Some(FLOAT_NODATA),
    )
}

pub fn write_tiff_u8(
    output: &Path,
    cols: usize,
    rows: usize,
    data: &[u8],
    nodata: Option<f64>,
    description: &str,
) -> Result<Dataset> {
    write_tiff(output, cols, rows, &[TiffBand { data, description }], nodata)
}

use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use tracing::{info, warn};

use crate::core::raster::GeoTransform;
use crate::error::{Error, Result};

/// Output size keeping aspect ratio, with the long side at `target_size`.
/// Upscaling is refused: the original size is kept.
pub fn calculate_resize_dimensions(
    original_cols: usize,
    original_rows: usize,
    target_size: usize,
) -> (usize, usize) {
    let short_side = original_rows.min(original_cols);
    let long_side = original_rows.max(original_cols);

    if target_size >= long_side || target_size == 0 {
        if target_size > long_side {
            warn!(
                "Target size {} is larger than original long side {}. Keeping original dimensions {}x{}",
                target_size, long_side, original_cols, original_rows
            );
        }
        return (original_cols, original_rows);
    }

    let scale_factor = target_size as f64 / long_side as f64;
    let new_short_side = ((short_side as f64 * scale_factor).round() as usize).max(1);

    if original_cols > original_rows {
        (target_size, new_short_side)
    } else {
        (new_short_side, target_size)
    }
}

/// Resize interleaved RGB bytes. Categorical images (`smooth == false`) use
/// nearest-neighbour so no blended colours appear.
pub fn resize_rgb_image(
    data: &[u8],
    original_cols: usize,
    original_rows: usize,
    target_cols: usize,
    target_rows: usize,
    smooth: bool,
) -> Result<Vec<u8>> {
    let alg = if smooth {
        ResizeAlg::Convolution(FilterType::Lanczos3)
    } else {
        ResizeAlg::Nearest
    };
    let resize_options = ResizeOptions::new().resize_alg(alg);
    let mut resizer = Resizer::new();

    let src_image = Image::from_vec_u8(
        original_cols as u32,
        original_rows as u32,
        data.to_vec(),
        PixelType::U8x3,
    )
    .map_err(Error::render)?;
    let mut dst_image = Image::new(target_cols as u32, target_rows as u32, PixelType::U8x3);
    resizer
        .resize(&src_image, &mut dst_image, &resize_options)
        .map_err(Error::render)?;

    Ok(dst_image.into_vec())
}

/// Geotransform of the resized image covering the same ground extent
pub fn scale_geotransform(
    gt: &GeoTransform,
    original: (usize, usize),
    resized: (usize, usize),
) -> GeoTransform {
    let (rows, cols) = original;
    let (new_rows, new_cols) = resized;
    let sx = cols as f64 / new_cols.max(1) as f64;
    let sy = rows as f64 / new_rows.max(1) as f64;
    GeoTransform {
        pixel_width: gt.pixel_width * sx,
        col_rotation: gt.col_rotation * sx,
        pixel_height: gt.pixel_height * sy,
        row_rotation: gt.row_rotation * sy,
        ..*gt
    }
}

/// RGB image at the requested long side plus its scaled geotransform
pub fn resize_rgb_with_transform(
    rgb: Vec<u8>,
    cols: usize,
    rows: usize,
    target_size: Option<usize>,
    gt: &GeoTransform,
    smooth: bool,
) -> Result<(usize, usize, Vec<u8>, GeoTransform)> {
    let Some(size) = target_size else {
        return Ok((cols, rows, rgb, *gt));
    };
    let (new_cols, new_rows) = calculate_resize_dimensions(cols, rows, size);
    if (new_cols, new_rows) == (cols, rows) {
        return Ok((cols, rows, rgb, *gt));
    }
    info!(
        "Original size: {}x{}, New size: {}x{}",
        cols, rows, new_cols, new_rows
    );
    let resized = resize_rgb_image(&rgb, cols, rows, new_cols, new_rows, smooth)?;
    let scaled = scale_geotransform(gt, (rows, cols), (new_rows, new_cols));
    Ok((new_cols, new_rows, resized, scaled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_dimensions_keep_aspect() {
        assert_eq!(calculate_resize_dimensions(2000, 1000, 500), (500, 250));
        assert_eq!(calculate_resize_dimensions(1000, 2000, 500), (250, 500));
        assert_eq!(calculate_resize_dimensions(100, 50, 400), (100, 50));
    }

    #[test]
    fn test_scaled_transform_covers_same_extent() {
        let gt = GeoTransform::new(300_000.0, 2_710_000.0, 10.0, -10.0);
        let scaled = scale_geotransform(&gt, (1000, 2000), (250, 500));
        assert_eq!(scaled.pixel_width, 40.0);
        assert_eq!(scaled.pixel_height, -40.0);
        assert_eq!(
            gt.bounds(1000, 2000),
            scaled.bounds(250, 500),
            "extent is unchanged"
        );
    }

    #[test]
    fn test_nearest_resize_keeps_palette_colours() {
        let mut rgb = Vec::new();
        for i in 0..16 {
            rgb.extend_from_slice(if i % 2 == 0 { &[255, 0, 0] } else { &[0, 0, 255] });
        }
        let out = resize_rgb_image(&rgb, 4, 4, 2, 2, false).unwrap();
        for px in out.chunks_exact(3) {
            assert!(px == [255, 0, 0] || px == [0, 0, 255], "unexpected {:?}", px);
        }
    }
}

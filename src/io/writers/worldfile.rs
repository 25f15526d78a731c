use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::raster::{Crs, GeoTransform};
use crate::error::Result;
use crate::io::writers::metadata::projection_wkt;

/// World-file extension for an image: `.jgw` for JPEG, `.tfw` for TIFF, ...
fn world_extension(output_image: &Path) -> String {
    let ext = output_image
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "jgw".to_string(),
        "png" => "pgw".to_string(),
        "tif" | "tiff" => "tfw".to_string(),
        other => match other.chars().next() {
            Some(first) => format!("{}w", first),
            None => "wld".to_string(),
        },
    }
}

/// Write a world file next to the raster image using the provided geotransform.
/// The world file stores the transform in pixel-center convention.
pub fn write_world_file(output_image: &Path, transform: &GeoTransform) -> Result<PathBuf> {
    let world_path = output_image.with_extension(world_extension(output_image));

    // A: pixel size in X, D: rotation about Y, B: rotation about X, E: pixel size Y
    // C, F: center of upper-left pixel
    let a = transform.pixel_width;
    let d = transform.col_rotation;
    let b = transform.row_rotation;
    let e = transform.pixel_height;
    let (c, f) = transform.pixel_center(0, 0);

    let mut file = File::create(&world_path)?;
    for v in [a, d, b, e, c, f] {
        writeln!(file, "{:.12}", v)?;
    }
    Ok(world_path)
}

/// Write a .prj file holding the CRS as WKT
pub fn write_prj_file(output_image: &Path, crs: &Crs) -> Result<PathBuf> {
    let prj_path = output_image.with_extension("prj");
    std::fs::write(&prj_path, projection_wkt(crs)?.as_bytes())?;
    Ok(prj_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_extension() {
        assert_eq!(world_extension(Path::new("a/ndvi.jpg")), "jgw");
        assert_eq!(world_extension(Path::new("a/ndvi.TIF")), "tfw");
        assert_eq!(world_extension(Path::new("a/ndvi.bmp")), "bw");
        assert_eq!(world_extension(Path::new("a/ndvi")), "wld");
    }

    #[test]
    fn test_world_file_uses_pixel_centers() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("q.jpg");
        let gt = GeoTransform::new(300_000.0, 2_710_000.0, 10.0, -10.0);
        let path = write_world_file(&img, &gt).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        let values: Vec<f64> = text.lines().map(|l| l.parse().unwrap()).collect();
        assert_eq!(values, vec![10.0, 0.0, 0.0, -10.0, 300_005.0, 2_709_995.0]);
    }
}

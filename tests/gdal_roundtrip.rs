use std::collections::BTreeMap;
use std::path::Path;

use tempfile::TempDir;

use landshift::api::{
    index_stack_to_path, process_pair_to_dir, renderers_for, transitions_between_paths,
};
use landshift::core::params::{QualityMask, QualityRule};
use landshift::core::raster::{Crs, GeoTransform, Georeference};
use landshift::core::transitions::LandCoverClass;
use landshift::io::writers::metadata::embed_tiff_metadata;
use landshift::io::writers::tiff::{TiffBand, write_tiff};
use landshift::io::{GdalReader, describe, read_single_band};
use landshift::render::ReportRenderer;
use landshift::{
    BandRole, Config, Error, GdalRasterSource, IndexParams, RasterSource, SourceParams,
    SpectralIndex,
};

const ROWS: usize = 6;
const COLS: usize = 8;

fn georef(rows: usize, cols: usize) -> Georeference {
    Georeference::new(
        rows,
        cols,
        GeoTransform::new(500_000.0, 4_100_000.0, 10.0, -10.0),
        Crs::projected_epsg(32633),
    )
}

/// Write a georeferenced u16 GeoTIFF, one `(description, samples)` per band
fn write_u16(path: &Path, bands: &[(&str, Vec<u16>)], nodata: Option<f64>, georeferenced: bool) {
    let tiff_bands: Vec<TiffBand<'_, u16>> = bands
        .iter()
        .map(|(description, data)| TiffBand {
            data,
            description,
        })
        .collect();
    let mut ds = write_tiff(path, COLS, ROWS, &tiff_bands, nodata).unwrap();
    if georeferenced {
        embed_tiff_metadata(&mut ds, &georef(ROWS, COLS), &BTreeMap::new()).unwrap();
    }
}

/// Six-band Sentinel-2 style scene in digital numbers (reflectance x 10000)
fn write_scene(path: &Path, f: impl Fn(BandRole, usize, usize) -> u16) {
    let bands: Vec<(&str, Vec<u16>)> = BandRole::ALL
        .iter()
        .map(|role| {
            let data = (0..ROWS * COLS).map(|i| f(*role, i / COLS, i % COLS)).collect();
            (role.sentinel2_name(), data)
        })
        .collect();
    write_u16(path, &bands, Some(0.0), true);
}

fn before_scene(role: BandRole, _r: usize, _c: usize) -> u16 {
    match role {
        BandRole::Nir => 5000,
        BandRole::Red => 2000,
        _ => 1000,
    }
}

/// Left half loses vegetation, pixel (0, 0) has no red sample
fn after_scene(role: BandRole, r: usize, c: usize) -> u16 {
    match (role, c < COLS / 2) {
        (BandRole::Red, _) if r == 0 && c == 0 => 0,
        (BandRole::Nir | BandRole::Red, true) => 3000,
        _ => before_scene(role, r, c),
    }
}

#[test]
fn test_detect_writes_rasters_quicklooks_and_report() {
    let dir = TempDir::new().unwrap();
    let before = dir.path().join("2019.tif");
    let after = dir.path().join("2024.tif");
    write_scene(&before, before_scene);
    write_scene(&after, after_scene);

    let mut config = Config::default();
    config.pipeline.threshold = 0.2;
    config.output.quicklook = true;
    config.output.quicklook_size = Some(4);
    let renderers = renderers_for(&config.output);
    let renderers: Vec<&dyn ReportRenderer> = renderers.iter().map(|r| r.as_ref()).collect();
    let out = dir.path().join("out");

    let (report, summary) =
        process_pair_to_dir(&before, &after, &out, &config, &renderers).unwrap();

    let area = &report.changes[0].area;
    assert_eq!(area.total_pixels, ROWS * COLS);
    assert_eq!(area.invalid_pixels, 1);
    assert_eq!(area.changed_pixels, ROWS * COLS / 2 - 1);
    assert_eq!(area.unchanged_pixels, ROWS * COLS / 2);
    assert!((area.changed_area_m2 - 2300.0).abs() < 1e-6);
    assert_eq!(report.georef.crs.epsg, Some(32633));

    for name in [
        "ndvi_before.tif",
        "ndvi_after.tif",
        "ndvi_diff.tif",
        "ndvi_change_mask.tif",
        "ndvi_change_mask.jpg",
        "ndvi_change_mask.jgw",
        "ndvi_diff.prj",
        "ndvi_before.json",
        "report.json",
    ] {
        assert!(out.join(name).exists(), "{} not written", name);
    }
    assert!(summary.files.iter().all(|p| p.exists()));

    let mask = read_single_band(&out.join("ndvi_change_mask.tif"), 1).unwrap();
    assert!(!mask.is_valid(0, 0), "invalid pixels carry nodata 0");
    assert_eq!(mask.get(0, 1), Some(2.0));
    assert_eq!(mask.get(5, 7), Some(1.0));
    assert_eq!(mask.georef().transform, report.georef.transform);

    let diff = read_single_band(&out.join("ndvi_diff.tif"), 1).unwrap();
    let d = diff.get(3, 2).unwrap();
    assert!((d + 0.428_571).abs() < 1e-5, "diff = {}", d);
    assert!(!diff.is_valid(0, 0));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("report.json")).unwrap()).unwrap();
    assert_eq!(json["crs"], "EPSG:32633");
    assert_eq!(json["indices"][0]["index"], "ndvi");
    assert_eq!(json["indices"][0]["area"]["changed_pixels"], 23);
    assert_eq!(json["before"]["label"], "before");
}

#[test]
fn test_cloud_probability_band_masks_pixels() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scene.tif");
    let mut bands: Vec<(&str, Vec<u16>)> = BandRole::ALL
        .iter()
        .map(|role| {
            (
                role.sentinel2_name(),
                (0..ROWS * COLS)
                    .map(|i| before_scene(*role, i / COLS, i % COLS))
                    .collect(),
            )
        })
        .collect();
    // Cloud probability 80% on the first row, 10% elsewhere
    bands.push((
        "cloud probability",
        (0..ROWS * COLS).map(|i| if i < COLS { 80 } else { 10 }).collect(),
    ));
    write_u16(&path, &bands, None, true);

    let source = GdalRasterSource::new(SourceParams {
        quality: Some(QualityMask {
            band: 7,
            path: None,
            rule: QualityRule::Probability { max: 40.0 },
        }),
        ..Default::default()
    });
    let scene = source.load(&path).unwrap();
    let valid = scene.valid_mask();
    assert!(!valid[[0, 3]]);
    assert!(valid[[1, 3]]);
    let expected = COLS as f64 / (ROWS * COLS) as f64;
    assert!((scene.invalid_fraction() - expected).abs() < 1e-12);

    let red = scene.band(BandRole::Red).unwrap();
    assert!((red.raster.get(2, 2).unwrap() - 0.2).abs() < 1e-12);
}

#[test]
fn test_band_descriptions_override_layout() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("two_band.tif");
    write_u16(
        &path,
        &[
            ("B8", vec![6000; ROWS * COLS]),
            ("B4", vec![2000; ROWS * COLS]),
        ],
        None,
        true,
    );

    let source =
        GdalRasterSource::new(SourceParams::default().require_for(&[SpectralIndex::Ndvi]));
    let scene = source.load(&path).unwrap();
    let nir = scene.band(BandRole::Nir).unwrap();
    assert!((nir.raster.get(0, 0).unwrap() - 0.6).abs() < 1e-12);

    // SWIR1 keeps its layout slot (band 5) which the file does not have
    let short = GdalRasterSource::new(SourceParams::default().require_for(&[SpectralIndex::Ndbi]));
    assert!(matches!(short.load(&path), Err(Error::Format(_))));

    let mut layout = SourceParams::sentinel2_layout();
    layout.remove(&BandRole::Swir1);
    let unmapped = GdalRasterSource::new(
        SourceParams {
            layout,
            ..Default::default()
        }
        .require_for(&[SpectralIndex::Ndbi]),
    );
    match unmapped.load(&path) {
        Err(Error::MissingBand { role, .. }) => assert_eq!(role, BandRole::Swir1),
        other => panic!("expected MissingBand, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_too_few_bands_is_a_format_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("three_band.tif");
    let bands: Vec<(&str, Vec<u16>)> = (0..3).map(|_| ("", vec![1000; ROWS * COLS])).collect();
    write_u16(&path, &bands, None, true);

    // NIR sits at band 4 in the default layout
    let source =
        GdalRasterSource::new(SourceParams::default().require_for(&[SpectralIndex::Ndvi]));
    match source.load(&path) {
        Err(Error::Format(msg)) => assert!(msg.contains("3 band(s)"), "{}", msg),
        other => panic!("expected Format, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_index_stack_round_trip() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("scene.tif");
    let output = dir.path().join("stack").join("indices.tif");
    write_scene(&input, after_scene);

    let stack = index_stack_to_path(
        &input,
        &output,
        &SourceParams::default(),
        &[SpectralIndex::Ndvi, SpectralIndex::Ndwi],
        &IndexParams::default(),
    )
    .unwrap();
    assert_eq!(stack.rasters.len(), 2);

    let info = describe(&output).unwrap();
    assert_eq!(info.bands, 2);
    assert_eq!(info.band_descriptions, vec!["NDVI", "NDWI"]);
    assert_eq!((info.size_x, info.size_y), (COLS, ROWS));
    assert_eq!(info.nodata[0], Some(-9999.0));

    let ndvi = read_single_band(&output, 1).unwrap();
    assert!((ndvi.get(5, 7).unwrap() - 3.0 / 7.0).abs() < 1e-6);
    assert!(!ndvi.is_valid(0, 0));
    // NDWI = (green - nir) / (green + nir) = (0.1 - 0.3) / 0.4
    let ndwi = read_single_band(&output, 2).unwrap();
    assert!((ndwi.get(1, 1).unwrap() + 0.5).abs() < 1e-6);
}

#[test]
fn test_transitions_between_class_rasters() {
    let dir = TempDir::new().unwrap();
    let before = dir.path().join("classes_2019.tif");
    let after = dir.path().join("classes_2024.tif");
    // Everything vegetation (2) before; right half becomes built-up (3) after
    write_u16(&before, &[("class", vec![2; ROWS * COLS])], Some(0.0), true);
    let later: Vec<u16> = (0..ROWS * COLS)
        .map(|i| if i % COLS >= COLS / 2 { 3 } else { 2 })
        .collect();
    write_u16(&after, &[("class", later)], Some(0.0), true);

    let matrix = transitions_between_paths(&before, &after, &LandCoverClass::defaults()).unwrap();
    assert_eq!(matrix.count(2, 3), Some(ROWS * COLS / 2));
    assert_eq!(matrix.count(2, 2), Some(ROWS * COLS / 2));
    assert_eq!(matrix.unchanged() + matrix.changed(), ROWS * COLS);
    assert_eq!(matrix.invalid_pixels, 0);
}

#[test]
fn test_missing_file_and_missing_georeference() {
    let dir = TempDir::new().unwrap();
    let absent = dir.path().join("absent.tif");
    assert!(matches!(GdalReader::open(&absent), Err(Error::Io(_))));

    let plain = dir.path().join("plain.tif");
    write_u16(&plain, &[("B4", vec![1; ROWS * COLS])], None, false);
    let reader = GdalReader::open(&plain).unwrap();
    assert!(matches!(reader.georeference(), Err(Error::Georeference(_))));
}

#[test]
fn test_mismatched_grids_abort_detection() {
    let dir = TempDir::new().unwrap();
    let before = dir.path().join("a.tif");
    let after = dir.path().join("b.tif");
    write_scene(&before, before_scene);
    write_scene(&after, before_scene);
    {
        // Shift the second scene by one pixel
        let mut ds = gdal::Dataset::open_ex(
            &after,
            gdal::DatasetOptions {
                open_flags: gdal::GdalOpenFlags::GDAL_OF_UPDATE,
                ..Default::default()
            },
        )
        .unwrap();
        let shifted = georef(ROWS, COLS).transform.shifted(1, 0).to_gdal();
        ds.set_geo_transform(&shifted).unwrap();
    }

    let config = Config::default();
    let renderers = renderers_for(&config.output);
    let renderers: Vec<&dyn ReportRenderer> = renderers.iter().map(|r| r.as_ref()).collect();
    let err = process_pair_to_dir(&before, &after, &dir.path().join("out"), &config, &renderers)
        .unwrap_err();
    assert!(matches!(err, Error::GeometryMismatch { .. }), "{}", err);
    assert!(!dir.path().join("out").join("report.json").exists());
}

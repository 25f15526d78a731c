use chrono::Utc;
use gdal::Dataset;
use gdal::Metadata;
use gdal::spatial_ref::SpatialRef;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::raster::{Crs, GeoTransform, Georeference};
use crate::error::{Error, Result};

/// Provenance fields written into every output, plus caller-supplied entries.
/// Keys are upper-cased the way GDAL metadata items usually are.
pub fn provenance_fields<I, K, V>(extra: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut metadata = BTreeMap::new();
    metadata.insert("CONVERSION_TOOL".to_string(), "landshift".to_string());
    metadata.insert(
        "CONVERSION_VERSION".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    metadata.insert("CONVERSION_TIMESTAMP".to_string(), Utc::now().to_rfc3339());
    for (k, v) in extra {
        metadata.insert(k.as_ref().to_ascii_uppercase(), v.into());
    }
    metadata
}

/// Convert metadata to JSON: lower-case keys, numbers where values parse as such
pub fn convert_metadata_to_json(metadata: &BTreeMap<String, String>) -> Map<String, Value> {
    let mut json_metadata = Map::new();
    for (key, value) in metadata {
        let json_key = key.to_lowercase();
        let v = match value.parse::<f64>() {
            Ok(num) if num.is_finite() => json!(num),
            _ => Value::String(value.clone()),
        };
        json_metadata.insert(json_key, v);
    }
    json_metadata
}

/// WKT for a CRS, resolving bare EPSG codes through GDAL
pub fn projection_wkt(crs: &Crs) -> Result<String> {
    if !crs.wkt.is_empty() {
        return Ok(crs.wkt.clone());
    }
    match crs.epsg {
        Some(code) => Ok(SpatialRef::from_epsg(code)?.to_wkt()?),
        None => Err(Error::Georeference(
            "CRS has neither WKT nor EPSG code".to_string(),
        )),
    }
}

/// Set georeference and metadata items on a freshly created GeoTIFF
pub fn embed_tiff_metadata(
    ds: &mut Dataset,
    georef: &Georeference,
    metadata: &BTreeMap<String, String>,
) -> Result<()> {
    // An identity transform means "not georeferenced"; don't write it or a projection
    if !georef.transform.is_identity() {
        ds.set_geo_transform(&georef.transform.to_gdal())?;
        ds.set_projection(&projection_wkt(&georef.crs)?)?;
    }
    for (key, value) in metadata {
        ds.set_metadata_item(key, value, "")?;
    }
    Ok(())
}

/// Write `<output>.json` next to an image, with geotransform and CRS alongside
/// the metadata fields
pub fn create_metadata_sidecar(
    output_path: &Path,
    transform: &GeoTransform,
    crs: &Crs,
    metadata: &BTreeMap<String, String>,
) -> Result<PathBuf> {
    let mut json_metadata = convert_metadata_to_json(metadata);
    json_metadata.insert("geotransform".to_string(), json!(transform.to_gdal()));
    json_metadata.insert("crs".to_string(), Value::String(crs.identifier()));

    let sidecar_path = output_path.with_extension("json");
    let json_string = serde_json::to_string_pretty(&Value::Object(json_metadata))?;
    std::fs::write(&sidecar_path, json_string)?;
    info!("Created metadata sidecar: {:?}", sidecar_path);
    Ok(sidecar_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provenance_keys_are_uppercased() {
        let m = provenance_fields([("index", "NDVI"), ("threshold", "0.1")]);
        assert_eq!(m["INDEX"], "NDVI");
        assert_eq!(m["CONVERSION_TOOL"], "landshift");
        assert!(m.contains_key("CONVERSION_TIMESTAMP"));
    }

    #[test]
    fn test_json_conversion_keeps_numbers_numeric() {
        let mut m = BTreeMap::new();
        m.insert("THRESHOLD".to_string(), "0.25".to_string());
        m.insert("INDEX".to_string(), "NDVI".to_string());
        m.insert("BAD".to_string(), "NaN".to_string());
        let j = convert_metadata_to_json(&m);
        assert_eq!(j["threshold"], json!(0.25));
        assert_eq!(j["index"], json!("NDVI"));
        assert_eq!(j["bad"], json!("NaN"));
    }
}

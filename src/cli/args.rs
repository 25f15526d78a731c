use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use landshift::types::AreaModel;
use landshift::{ChangeMode, Error, SpectralIndex};

/// Accepts index names case-insensitively and reports the supported set otherwise
fn parse_index(s: &str) -> Result<SpectralIndex, String> {
    s.parse::<SpectralIndex>().map_err(|e: Error| e.to_string())
}

#[derive(Parser)]
#[command(
    name = "landshift",
    version,
    about = "Two-epoch land-cover change detection from multispectral rasters"
)]
pub struct CliArgs {
    /// Enable debug logging (otherwise RUST_LOG is honoured, default "warn")
    #[arg(long, global = true, default_value_t = false)]
    pub log: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compare two epochs and write index, difference and change-mask outputs
    Detect(DetectArgs),
    /// Compute spectral indices of one scene into a multi-band GeoTIFF
    Indices(IndicesArgs),
    /// Print georeference and band metadata of raster files
    Inspect(InspectArgs),
    /// Class-to-class transition counts between two classification rasters
    Transitions(TransitionArgs),
}

#[derive(Args)]
pub struct DetectArgs {
    /// Earlier scene (multi-band GeoTIFF or any GDAL raster)
    #[arg(long)]
    pub before: PathBuf,

    /// Later scene on the same grid
    #[arg(long)]
    pub after: PathBuf,

    /// Directory receiving rasters, quicklooks and report.json
    #[arg(short, long)]
    pub output_dir: PathBuf,

    /// Spectral index to compare; repeat or comma-separate for several
    #[arg(long = "index", value_parser = parse_index, value_delimiter = ',')]
    pub indices: Vec<SpectralIndex>,

    /// Absolute difference counted as change (inclusive)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// binary (changed/unchanged) or signed (increase/decrease/unchanged)
    #[arg(long, value_enum)]
    pub mode: Option<ChangeMode>,

    /// JSON configuration file; command-line flags override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Also write colour JPEG quicklooks with world files
    #[arg(long, default_value_t = false)]
    pub quicklook: bool,

    /// Skip the GeoTIFF outputs
    #[arg(long, default_value_t = false)]
    pub no_geotiff: bool,

    /// Quicklook size. Options:
    /// - Custom: any positive integer (long side in pixels, e.g. 1024)
    /// - Original: "original" (no scaling)
    #[arg(long, default_value = "original")]
    pub size: String,

    /// Process in blocks of this many rows
    #[arg(long)]
    pub block_rows: Option<usize>,

    /// Warn when an epoch has more than this share of invalid pixels (0..1)
    #[arg(long)]
    pub max_invalid_fraction: Option<f64>,

    /// SAVI soil-brightness constant L
    #[arg(long)]
    pub soil_brightness: Option<f64>,

    /// Pixel-area measurement on projected grids
    #[arg(long, value_enum)]
    pub area_model: Option<AreaModel>,

    /// 1-based band holding a cloud/quality layer in each scene
    #[arg(long)]
    pub cloud_band: Option<usize>,

    /// Treat the cloud band as probability; values above this are invalid.
    /// Without it any non-zero value is invalid.
    #[arg(long, requires = "cloud_band")]
    pub cloud_max: Option<f64>,

    /// Multiplier converting stored values to reflectance (e.g. 0.0001)
    #[arg(long)]
    pub scale: Option<f64>,

    /// Override the nodata value declared by the files
    #[arg(long)]
    pub nodata: Option<f64>,

    /// Label of the earlier epoch in output names
    #[arg(long)]
    pub before_label: Option<String>,

    /// Label of the later epoch in output names
    #[arg(long)]
    pub after_label: Option<String>,
}

#[derive(Args)]
pub struct IndicesArgs {
    /// Input scene
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output multi-band GeoTIFF
    #[arg(short, long)]
    pub output: PathBuf,

    /// Index to compute; repeat or comma-separate. Defaults to all supported indices
    #[arg(long = "index", value_parser = parse_index, value_delimiter = ',')]
    pub indices: Vec<SpectralIndex>,

    /// JSON configuration file (band layout, reflectance scaling, index constants)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// SAVI soil-brightness constant L
    #[arg(long)]
    pub soil_brightness: Option<f64>,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Raster file(s); with two files their grids are compared
    #[arg(short, long, required = true)]
    pub input: Vec<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct TransitionArgs {
    /// Earlier classification raster (class codes in band 1)
    #[arg(long)]
    pub before: PathBuf,

    /// Later classification raster
    #[arg(long)]
    pub after: PathBuf,

    /// Class codes to tabulate
    #[arg(long, value_delimiter = ',', default_values_t = vec![1, 2, 3, 4])]
    pub classes: Vec<i64>,

    /// Class names, in the same order as --classes
    #[arg(long, value_delimiter = ',')]
    pub names: Vec<String>,

    /// Also write the matrix as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

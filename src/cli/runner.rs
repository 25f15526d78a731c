use std::path::Path;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use landshift::api::{
    ChangeReport, ReportSummary, index_stack_to_path, process_pair_to_dir, renderers_for,
    transitions_between_paths,
};
use landshift::core::params::{Config, QualityMask, QualityRule};
use landshift::core::transitions::{LandCoverClass, TransitionMatrix};
use landshift::io::{GdalReader, RasterInfo, describe};
use landshift::render::ReportRenderer;
use landshift::types::SpectralIndex;

use super::args::{CliArgs, Command, DetectArgs, IndicesArgs, InspectArgs, TransitionArgs};
use super::errors::AppError;

fn init_logging(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn parse_size(size: &str) -> Result<Option<usize>, AppError> {
    if size == "original" {
        return Ok(None);
    }
    let parsed = size.parse::<usize>().map_err(|_| AppError::InvalidSize {
        size: size.to_string(),
    })?;
    if parsed == 0 {
        return Err(AppError::ZeroSize { size: parsed });
    }
    Ok(Some(parsed))
}

fn load_config(path: Option<&Path>) -> landshift::Result<Config> {
    match path {
        Some(p) => {
            info!("Loading configuration from {:?}", p);
            Config::from_json_file(p)
        }
        None => Ok(Config::default()),
    }
}

/// Config file values, then command-line overrides
fn detect_config(args: &DetectArgs) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = load_config(args.config.as_deref())?;
    let pipeline = &mut config.pipeline;
    if !args.indices.is_empty() {
        pipeline.indices = args.indices.clone();
    }
    if let Some(t) = args.threshold {
        pipeline.threshold = t;
    }
    if let Some(mode) = args.mode {
        pipeline.mode = mode;
    }
    if args.block_rows.is_some() {
        pipeline.block_rows = args.block_rows;
    }
    if args.max_invalid_fraction.is_some() {
        pipeline.max_invalid_fraction = args.max_invalid_fraction;
    }
    if let Some(l) = args.soil_brightness {
        pipeline.index_params.soil_brightness = l;
    }
    if let Some(model) = args.area_model {
        pipeline.area.model = model;
    }
    if let Some(label) = &args.before_label {
        pipeline.labels.before = label.clone();
    }
    if let Some(label) = &args.after_label {
        pipeline.labels.after = label.clone();
    }
    pipeline.validate()?;

    let source = &mut config.source;
    if let Some(scale) = args.scale {
        source.reflectance.scale = scale;
    }
    if args.nodata.is_some() {
        source.nodata = args.nodata;
    }
    if let Some(band) = args.cloud_band {
        let rule = match args.cloud_max {
            Some(max) => QualityRule::Probability { max },
            None => QualityRule::Flag,
        };
        source.quality = Some(QualityMask {
            band,
            path: None,
            rule,
        });
    }

    let output = &mut config.output;
    if args.quicklook {
        output.quicklook = true;
    }
    if args.no_geotiff {
        output.geotiff = false;
    }
    if let Some(size) = parse_size(&args.size)? {
        output.quicklook_size = Some(size);
    }
    if !output.geotiff && !output.quicklook {
        return Err(AppError::NoOutputs.into());
    }
    Ok(config)
}

fn print_report(report: &ChangeReport, summary: &ReportSummary) {
    println!(
        "Grid: {} x {} pixels, {}",
        report.georef.cols, report.georef.rows, report.georef.crs
    );
    for epoch in [&report.before, &report.after] {
        println!(
            "  {}: {} of {} pixel(s) invalid ({:.1}%)",
            epoch.label,
            epoch.invalid_pixels,
            epoch.total_pixels,
            epoch.invalid_fraction * 100.0
        );
    }
    println!(
        "Threshold {} ({} mode)",
        report.params.threshold, report.params.mode
    );
    for change in &report.changes {
        let area = &change.area;
        let fraction = area
            .changed_fraction
            .map(|f| format!("{:.2}%", f * 100.0))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "{:>6}: changed {:>10} px  {:>12.4} km²  ({} of valid area)",
            change.index.to_string(),
            area.changed_pixels,
            area.changed_area_km2,
            fraction
        );
        if area.increase_pixels + area.decrease_pixels > 0 {
            println!(
                "        increase {:>9} px  {:>12.4} km²   decrease {:>9} px  {:>12.4} km²",
                area.increase_pixels,
                area.increase_area_km2,
                area.decrease_pixels,
                area.decrease_area_km2
            );
        }
    }
    let warnings = report.all_warnings();
    if !warnings.is_empty() {
        println!("Warnings:");
        for w in warnings {
            println!("  - {}", w);
        }
    }
    println!("{} file(s) written", summary.files.len());
}

fn run_detect(args: DetectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = detect_config(&args)?;
    let renderers = renderers_for(&config.output);
    let renderer_refs: Vec<&dyn ReportRenderer> = renderers.iter().map(|r| r.as_ref()).collect();

    info!(
        "Detecting change {:?} -> {:?} into {:?}",
        args.before, args.after, args.output_dir
    );
    let (report, summary) = process_pair_to_dir(
        &args.before,
        &args.after,
        &args.output_dir,
        &config,
        &renderer_refs,
    )?;
    print_report(&report, &summary);
    Ok(())
}

fn run_indices(args: IndicesArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(args.config.as_deref())?;
    let mut params = config.pipeline.index_params;
    if let Some(l) = args.soil_brightness {
        params.soil_brightness = l;
    }
    let indices = if args.indices.is_empty() {
        SpectralIndex::ALL.to_vec()
    } else {
        args.indices
    };
    let stack = index_stack_to_path(&args.input, &args.output, &config.source, &indices, &params)?;
    println!(
        "Wrote {} band(s) ({}) to {:?}",
        stack.rasters.len(),
        indices
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(", "),
        args.output
    );
    for w in &stack.warnings {
        println!("  - {}", w);
    }
    Ok(())
}

fn print_info(info: &RasterInfo) {
    println!("{}", info.path.display());
    println!("  size: {} x {}, {} band(s)", info.size_x, info.size_y, info.bands);
    match info.geotransform {
        Some(gt) => println!("  geotransform: {:?}", gt),
        None => println!("  geotransform: none"),
    }
    if let Some((min_x, min_y, max_x, max_y)) = info.bounds {
        println!("  bounds: ({}, {}) - ({}, {})", min_x, min_y, max_x, max_y);
    }
    println!(
        "  crs: {}",
        if info.projection.is_empty() {
            "unknown".to_string()
        } else if info.geographic {
            format!("geographic, {} chars of WKT", info.projection.len())
        } else {
            format!("projected, {} chars of WKT", info.projection.len())
        }
    );
    for (i, (desc, nodata)) in info
        .band_descriptions
        .iter()
        .zip(info.nodata.iter())
        .enumerate()
    {
        let nodata = nodata.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string());
        println!("  band {}: '{}' nodata={}", i + 1, desc, nodata);
    }
}

fn run_inspect(args: InspectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let infos = args
        .input
        .iter()
        .map(|p| describe(p))
        .collect::<landshift::Result<Vec<_>>>()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
    } else {
        infos.iter().for_each(print_info);
    }

    if let [a, b] = args.input.as_slice() {
        let ga = GdalReader::open(a)?.georeference()?;
        let gb = GdalReader::open(b)?.georeference()?;
        let left = a.display().to_string();
        let right = b.display().to_string();
        match ga.ensure_matches(&gb, &left, &right) {
            Ok(()) => println!("Grids match: files can be compared pixel by pixel"),
            Err(e) => {
                warn!("{}", e);
                println!("Grids differ: {}", e);
            }
        }
    }
    Ok(())
}

fn print_matrix(matrix: &TransitionMatrix) {
    let width = matrix
        .classes
        .iter()
        .map(|c| c.name.len())
        .max()
        .unwrap_or(0)
        .max(12);
    print!("{:width$}", "before \\ after", width = width + 2);
    for c in &matrix.classes {
        print!(" {:>width$}", c.name, width = width);
    }
    println!();
    for (class, row) in matrix.classes.iter().zip(matrix.counts.iter()) {
        print!("{:width$}", class.name, width = width + 2);
        for count in row {
            print!(" {:>width$}", count, width = width);
        }
        println!();
    }
    let fraction = matrix
        .changed_fraction()
        .map(|f| format!("{:.2}%", f * 100.0))
        .unwrap_or_else(|| "n/a".to_string());
    println!(
        "unchanged {}, changed {} ({}), unclassified {}, invalid {}",
        matrix.unchanged(),
        matrix.changed(),
        fraction,
        matrix.unclassified_pixels,
        matrix.invalid_pixels
    );
}

fn run_transitions(args: TransitionArgs) -> Result<(), Box<dyn std::error::Error>> {
    let classes = if args.names.is_empty() {
        LandCoverClass::from_codes(&args.classes)
    } else {
        if args.names.len() != args.classes.len() {
            return Err(AppError::ClassNameCount {
                classes: args.classes.len(),
                names: args.names.len(),
            }
            .into());
        }
        args.classes
            .iter()
            .zip(args.names.iter())
            .map(|(code, name)| LandCoverClass::new(*code, name.clone()))
            .collect()
    };
    let matrix = transitions_between_paths(&args.before, &args.after, &classes)?;
    print_matrix(&matrix);
    if let Some(path) = &args.output {
        std::fs::write(path, serde_json::to_string_pretty(&matrix)?).map_err(AppError::from)?;
        info!("Transition matrix written to {:?}", path);
    }
    Ok(())
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(args.log);

    match args.command {
        Command::Detect(a) => run_detect(a),
        Command::Indices(a) => run_indices(a),
        Command::Inspect(a) => run_inspect(a),
        Command::Transitions(a) => run_transitions(a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use landshift::types::{AreaModel, ChangeMode};

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("original").unwrap(), None);
        assert_eq!(parse_size("512").unwrap(), Some(512));
        assert!(matches!(parse_size("0"), Err(AppError::ZeroSize { size: 0 })));
        assert!(matches!(parse_size("big"), Err(AppError::InvalidSize { .. })));
    }

    #[test]
    fn test_cli_overrides_defaults() {
        let args = CliArgs::parse_from([
            "landshift",
            "detect",
            "--before",
            "a.tif",
            "--after",
            "b.tif",
            "-o",
            "out",
            "--index",
            "ndvi,NDWI",
            "--threshold",
            "0.25",
            "--mode",
            "signed",
            "--cloud-band",
            "7",
            "--cloud-max",
            "40",
            "--quicklook",
            "--size",
            "256",
            "--soil-brightness",
            "0.25",
            "--area-model",
            "ground",
        ]);
        let Command::Detect(detect) = args.command else {
            panic!("expected detect");
        };
        let config = detect_config(&detect).unwrap();
        assert_eq!(
            config.pipeline.indices,
            vec![SpectralIndex::Ndvi, SpectralIndex::Ndwi]
        );
        assert_eq!(config.pipeline.threshold, 0.25);
        assert_eq!(config.pipeline.mode, ChangeMode::Signed);
        assert_eq!(config.pipeline.index_params.soil_brightness, 0.25);
        assert_eq!(config.pipeline.area.model, AreaModel::Ground);
        let quality = config.source.quality.unwrap();
        assert_eq!(quality.band, 7);
        assert_eq!(quality.rule, QualityRule::Probability { max: 40.0 });
        assert!(config.output.quicklook && config.output.geotiff);
        assert_eq!(config.output.quicklook_size, Some(256));
    }

    #[test]
    fn test_unknown_index_rejected_by_parser() {
        let res = CliArgs::try_parse_from([
            "landshift", "detect", "--before", "a", "--after", "b", "-o", "out", "--index", "ndsi",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let args = CliArgs::parse_from([
            "landshift",
            "detect",
            "--before",
            "a",
            "--after",
            "b",
            "-o",
            "out",
            "--threshold=-0.5",
        ]);
        let Command::Detect(detect) = args.command else {
            panic!("expected detect");
        };
        assert!(detect_config(&detect).is_err());
    }

    #[test]
    fn test_all_outputs_disabled_rejected() {
        let args = CliArgs::parse_from([
            "landshift", "detect", "--before", "a", "--after", "b", "-o", "out", "--no-geotiff",
        ]);
        let Command::Detect(detect) = args.command else {
            panic!("expected detect");
        };
        let err = detect_config(&detect).unwrap_err();
        assert!(err.to_string().contains("Nothing to write"));
    }
}

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;

use metaclean::config::{Config, EncodeOptions, OutputPolicy, RetentionPolicy, StructurePolicy, default_output_dir};
use metaclean::pipeline::{self, Outcome, Report};
use metaclean::presence::ScanResult;
use metaclean::tags::Category;
use metaclean::batch;

#[derive(Parser, Debug)]
#[command(
    name = "metaclean",
    version,
    about = "Scan images for embedded metadata and write sanitized copies",
    after_help = "Example: find ./photos -name '*.jpg' | metaclean --strip --outdir cleaned"
)]
struct Cli {
    /// Image files to process (or pipe paths via stdin)
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Scan and report metadata
    #[arg(long)]
    scan: bool,

    /// Strip metadata from files
    #[arg(long)]
    strip: bool,

    /// Only print paths of files that carry metadata (scan mode)
    #[arg(long)]
    positives: bool,

    /// Expand the GPS directory and decoded position (scan mode)
    #[arg(long = "show-gps")]
    show_gps: bool,

    /// Add a copyright tag (strip mode)
    #[arg(long, value_name = "TEXT")]
    copyright: Option<String>,

    /// Keep the capture date
    #[arg(long = "keep-date")]
    keep_date: bool,

    /// Keep the orientation tag as-is instead of rotating the pixels
    #[arg(long = "keep-orientation")]
    keep_orientation: bool,

    /// Keep the ICC color profile
    #[arg(long = "keep-icc")]
    keep_icc: bool,

    /// Keep pixel density (DPI)
    #[arg(long = "keep-dpi")]
    keep_dpi: bool,

    /// Process animated and multi-page images
    #[arg(long)]
    force: bool,

    /// Overwrite the original (atomic replace)
    #[arg(long)]
    inplace: bool,

    /// Directory for cleaned images (default: ~/Pictures/cleaned)
    #[arg(long, value_name = "DIR", conflicts_with = "inplace")]
    outdir: Option<PathBuf>,

    /// Progressive JPEG output (1) or baseline (0); only baseline is written
    #[arg(long, value_name = "0|1", value_parser = clap::value_parser!(u8).range(0..=1))]
    progressive: Option<u8>,

    /// JPEG quality when pixels are re-encoded
    #[arg(long, default_value_t = metaclean::config::DEFAULT_QUALITY,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Walk directories
    #[arg(short, long)]
    recursive: bool,

    /// Worker threads (default: number of CPUs)
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            retention: RetentionPolicy {
                keep_date: self.keep_date,
                keep_orientation: self.keep_orientation,
                copyright: self.copyright.clone(),
            },
            structure: StructurePolicy {
                keep_icc: self.keep_icc,
                keep_dpi: self.keep_dpi,
            },
            output: if self.inplace {
                OutputPolicy::in_place()
            } else {
                OutputPolicy::cleaned_dir(self.outdir.clone().unwrap_or_else(default_output_dir))
            },
            encode: EncodeOptions::with_quality(self.quality),
            force: self.force,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    if !cli.scan && !cli.strip {
        Cli::command().print_help()?;
        return Ok(());
    }

    let mut inputs = cli.paths.clone();
    if !std::io::stdin().is_terminal() {
        inputs.extend(read_paths(std::io::stdin().lock()).context("Failed to read paths from stdin")?);
    }
    if inputs.is_empty() {
        log::info!("No files provided on CLI or stdin.");
        return Ok(());
    }

    let images = pipeline::collect_images(&inputs, cli.recursive);
    let jobs = cli.jobs.unwrap_or_else(batch::available_parallelism);
    let config = cli.config();
    if cli.progressive == Some(1) {
        log::warn!("Progressive JPEG output is not supported; re-encoded JPEGs are baseline");
    }
    log::debug!("Config: {}", serde_json::to_string(&config)?);

    let mut failed = 0;
    let mut json_results = Vec::new();

    if cli.scan {
        batch::for_each(&images, jobs, |p| pipeline::scan_image(p), |report| {
            failed += usize::from(report.is_failure());
            if cli.json {
                json_results.extend(scan_json(&report, cli.positives));
            } else {
                print_scan(&report, &cli);
            }
        });
    }

    if cli.strip {
        log::info!("Processing {} path(s) with {jobs} worker(s)", images.len());
        let (mut emitted, mut skipped) = (0, 0);
        batch::for_each(&images, jobs, |p| pipeline::strip_image(p, &config), |report| {
            match &report.outcome {
                Outcome::Emitted(done) => {
                    emitted += 1;
                    for warning in &done.warnings {
                        log::warn!("{}: {warning}", report.path.display());
                    }
                    if let Some(copyright) = config.retention.copyright() {
                        log::debug!("Added copyright: {copyright}");
                    }
                }
                Outcome::Skipped(reason) => {
                    skipped += 1;
                    log::warn!("[SKIP] {}: {}", reason.code(), report.path.display());
                }
                Outcome::Failed(err) => {
                    failed += 1;
                    log::error!("[ERROR] {}: {err}", report.path.display());
                }
            }
            if cli.json {
                json_results.push(strip_json(&report));
            }
        });
        log::info!("Done: {emitted} cleaned, {skipped} skipped, {failed} failed");
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&json_results)?);
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn print_scan(report: &Report<ScanResult>, cli: &Cli) {
    let result = match &report.outcome {
        Outcome::Emitted(result) => result,
        Outcome::Skipped(reason) => {
            if !cli.positives {
                log::info!("[SKIP] {}: {}", reason.code(), report.path.display());
            }
            return;
        }
        Outcome::Failed(err) => {
            log::error!("[ERROR] Cannot read {}: {err}", report.path.display());
            return;
        }
    };

    if cli.positives {
        // Only the path, for chaining into --strip.
        if result.has_metadata {
            println!("{}", result.path.display());
        }
        return;
    }

    if result.tags.is_empty() {
        println!("[INFO] No metadata found in {}", result.path.display());
        return;
    }

    println!("=== Metadata for {} ({}) ===", result.path.display(), result.format);
    for tag in result.tags.iter().filter(|t| t.category != Category::Gps) {
        println!("{}: {}", tag.name, tag.value);
    }

    let gps: Vec<_> = result.tags.iter().filter(|t| t.category == Category::Gps).collect();
    if gps.is_empty() {
        return;
    }
    if cli.show_gps {
        println!("---- GPS ----");
        for tag in gps {
            println!("{}: {}", tag.name, tag.value);
        }
        if let Some(pos) = result.gps {
            println!("Position: {:.6}, {:.6}", pos.latitude, pos.longitude);
        }
    } else {
        println!("GPS: {} tag(s) (use --show-gps to expand)", gps.len());
    }
}

/// Line-delimited paths, blank lines ignored.
fn read_paths(reader: impl BufRead) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            paths.push(PathBuf::from(line));
        }
    }
    Ok(paths)
}

/// JSON record for one scanned path. With `positives` only images that carry
/// metadata, and failures, are reported.
fn scan_json(report: &Report<ScanResult>, positives: bool) -> Option<serde_json::Value> {
    let value = match &report.outcome {
        Outcome::Emitted(result) if positives && !result.has_metadata => return None,
        Outcome::Emitted(result) => serde_json::to_value(result).unwrap_or_default(),
        Outcome::Skipped(_) if positives => return None,
        Outcome::Skipped(reason) => serde_json::json!({
            "path": report.path.display().to_string(),
            "skipped": reason.code(),
        }),
        Outcome::Failed(err) => serde_json::json!({
            "path": report.path.display().to_string(),
            "error": err.code(),
            "message": err.to_string(),
        }),
    };
    Some(value)
}

fn strip_json(report: &Report<pipeline::Emitted>) -> serde_json::Value {
    let path = report.path.display().to_string();
    match &report.outcome {
        Outcome::Emitted(done) => serde_json::json!({
            "path": path,
            "output": done.output.display().to_string(),
            "format": done.format,
            "rebaked": done.rebaked,
            "warnings": done.warnings,
        }),
        Outcome::Skipped(reason) => serde_json::json!({
            "path": path,
            "skipped": reason.code(),
        }),
        Outcome::Failed(err) => serde_json::json!({
            "path": path,
            "error": err.code(),
            "message": err.to_string(),
        }),
    }
}

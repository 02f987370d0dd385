use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::container::{self, Plan};
use crate::error::{Error, Result};
use crate::exif::{self, Metadata, read_metadata};
use crate::format::{ImageFormat, sniff_path};
use crate::orientation;
use crate::presence::ScanResult;
use crate::rebuild::retained_tags;
use crate::tags::{Category, TagSet};

/// Why an input was passed over without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAnImage,
    Directory,
    /// Animated or multi-page input without `force`.
    Animated,
}

impl SkipReason {
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::NotAnImage => "not-an-image",
            SkipReason::Directory => "directory",
            SkipReason::Animated => "animated",
        }
    }
}

/// Terminal state of one image's run.
#[derive(Debug)]
pub enum Outcome<T> {
    Emitted(T),
    Skipped(SkipReason),
    Failed(Error),
}

impl<T> Outcome<T> {
    fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(value) => Outcome::Emitted(value),
            Err(Error::NotAnImage) => Outcome::Skipped(SkipReason::NotAnImage),
            Err(e) => Outcome::Failed(e),
        }
    }
}

/// The outcome of processing one input path.
///
/// # Example
///
/// ```rust,no_run
/// use metaclean::config::Config;
/// use metaclean::pipeline::{Outcome, strip_image};
/// use std::path::Path;
///
/// let report = strip_image(Path::new("photo.jpg"), &Config::default());
/// match &report.outcome {
///     Outcome::Emitted(done) => println!("wrote {}", done.output.display()),
///     Outcome::Skipped(reason) => println!("skipped: {}", reason.code()),
///     Outcome::Failed(err) => eprintln!("{}: {err}", report.path.display()),
/// }
/// ```
#[derive(Debug)]
pub struct Report<T> {
    pub path: PathBuf,
    pub outcome: Outcome<T>,
}

impl<T> Report<T> {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }
}

/// A rebuilt, verified image still in memory.
#[derive(Debug)]
pub struct Stripped {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    /// Tags written into the rebuilt container.
    pub retained: TagSet,
    /// Whether the orientation was baked into the pixels.
    pub rebaked: bool,
    pub warnings: Vec<String>,
}

/// In-memory result of [`strip_bytes`].
#[derive(Debug)]
pub enum StripOutcome {
    Stripped(Stripped),
    Skipped(SkipReason),
}

/// A cleaned file on disk.
#[derive(Debug)]
pub struct Emitted {
    pub output: PathBuf,
    pub format: ImageFormat,
    pub rebaked: bool,
    pub warnings: Vec<String>,
}

/// Collect the inputs to process.
///
/// Files are taken as-is; what they contain is decided later by sniffing.
/// Directories are walked with `recursive`, and otherwise passed through so
/// they show up as skipped. Missing paths are passed through as well and fail
/// with an I/O error when read.
pub fn collect_images(paths: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_dir() && recursive {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file() {
                    images.push(entry.into_path());
                }
            }
        } else {
            if !path.exists() {
                log::warn!("Path does not exist: {}", path.display());
            }
            images.push(path.clone());
        }
    }

    images
}

// ── scan ────────────────────────────────────────────────────────────

/// Read and classify an in-memory image.
pub fn scan_bytes(path: &Path, bytes: &[u8]) -> Result<ScanResult> {
    let meta = read_metadata(bytes)?;
    Ok(ScanResult::new(path, meta.format, &meta.tags))
}

/// Scan one file. Non-images and directories are skipped.
pub fn scan_image(path: &Path) -> Report<ScanResult> {
    let outcome = match precheck(path) {
        Some(reason) => Outcome::Skipped(reason),
        None => Outcome::from_result(read_file(path).and_then(|bytes| scan_bytes(path, &bytes))),
    };
    Report {
        path: path.to_path_buf(),
        outcome,
    }
}

// ── strip ───────────────────────────────────────────────────────────

/// Strip an in-memory image under `config`.
///
/// Runs read, classify, orientation rebake, rebuild and verification.
/// Nothing touches the filesystem.
pub fn strip_bytes(bytes: &[u8], config: &Config) -> Result<StripOutcome> {
    let meta = match read_metadata(bytes) {
        Err(Error::NotAnImage) => return Ok(StripOutcome::Skipped(SkipReason::NotAnImage)),
        other => other?,
    };
    if meta.structure.is_multi_frame() && !config.force {
        log::warn!(
            "{} with {} frames needs --force",
            meta.format,
            meta.structure.frames
        );
        return Ok(StripOutcome::Skipped(SkipReason::Animated));
    }

    let mut warnings = Vec::new();
    let mut keep_orientation_tag = config.retention.keep_orientation;
    let mut rebaked = None;

    if !keep_orientation_tag {
        if let Some(value) = meta.tags.orientation().filter(|&v| orientation::needs_rebake(v)) {
            match orientation::rebake(meta.format, bytes, value, &config.encode) {
                Ok(pixels) => rebaked = Some(pixels),
                Err(e) => {
                    log::warn!("Keeping orientation tag: {e}");
                    warnings.push(e.to_string());
                    keep_orientation_tag = true;
                }
            }
        }
    }

    let carry = exif::carry(&meta.structure, &config.structure);
    let retained = retained_tags(&meta.tags, &config.retention, keep_orientation_tag);
    let source = rebaked.as_deref().unwrap_or(bytes);
    let out = container::rebuild(meta.format, source, Plan {
        retained: &retained,
        carry: &carry,
    })?;

    verify(&meta, &out, &retained)?;

    Ok(StripOutcome::Stripped(Stripped {
        bytes: out,
        format: meta.format,
        retained,
        rebaked: rebaked.is_some(),
        warnings,
    }))
}

/// Re-read a rebuilt stream before it is allowed anywhere near the disk.
fn verify(source: &Metadata, out: &[u8], retained: &TagSet) -> Result<()> {
    let check = read_metadata(out).map_err(|e| Error::Encode(format!("rebuilt stream does not re-read: {e}")))?;
    if check.format != source.format {
        return Err(Error::Encode(format!(
            "rebuilt stream sniffs as {} instead of {}",
            check.format, source.format
        )));
    }
    if let Some(tag) = check
        .tags
        .iter()
        .find(|t| t.category() != Category::Other && !retained.contains(t.id()))
    {
        return Err(Error::Encode(format!("rebuilt stream still carries {}", tag.name())));
    }
    Ok(())
}

/// Strip one file and write the result where `config.output` says.
///
/// The original is only ever replaced in in-place mode, and only after the
/// rebuilt stream has been verified.
pub fn strip_image(path: &Path, config: &Config) -> Report<Emitted> {
    let outcome = match precheck(path) {
        Some(reason) => Outcome::Skipped(reason),
        None => match read_file(path).and_then(|bytes| strip_bytes(&bytes, config)) {
            Ok(StripOutcome::Skipped(reason)) => Outcome::Skipped(reason),
            Ok(StripOutcome::Stripped(stripped)) => Outcome::from_result(emit(path, stripped, config)),
            Err(e) => Outcome::from_result(Err(e)),
        },
    };
    Report {
        path: path.to_path_buf(),
        outcome,
    }
}

fn emit(path: &Path, stripped: Stripped, config: &Config) -> Result<Emitted> {
    let target = crate::output::output_path(path, &config.output)?;
    crate::output::write_atomic(&target, &stripped.bytes)?;
    log::info!("{} -> {}", path.display(), target.display());
    Ok(Emitted {
        output: target,
        format: stripped.format,
        rebaked: stripped.rebaked,
        warnings: stripped.warnings,
    })
}

fn precheck(path: &Path) -> Option<SkipReason> {
    if path.is_dir() {
        return Some(SkipReason::Directory);
    }
    // Missing or unreadable files fall through to the read and fail there.
    if path.is_file() && std::fs::File::open(path).is_ok() && !sniff_path(path).is_known() {
        return Some(SkipReason::NotAnImage);
    }
    None
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::io(path, e))
}

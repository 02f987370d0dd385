//! # metaclean
//!
//! Inspect images for embedded metadata and write sanitized copies.
//!
//! Supports JPEG, PNG, WebP and TIFF. Formats are detected from magic bytes,
//! never from the file extension. Stripping rebuilds each container from a
//! whitelist of structural blocks plus a minimal EXIF block holding only what
//! the retention policy asks for: the capture date, the orientation tag, and
//! an injected copyright string. GPS and camera tags never survive.
//!
//! When the orientation tag is dropped (the default) a rotated or mirrored
//! image is re-encoded with the transform baked into its pixels, so it still
//! displays upright.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use metaclean::config::{Config, OutputPolicy};
//! use metaclean::pipeline::{Outcome, collect_images, scan_image, strip_image};
//! use std::path::PathBuf;
//!
//! let images = collect_images(&[PathBuf::from("./photos")], true);
//!
//! for path in &images {
//!     if let Outcome::Emitted(scan) = scan_image(path).outcome {
//!         println!("{}: has metadata = {}", path.display(), scan.has_metadata);
//!     }
//! }
//!
//! let mut config = Config::default();
//! config.retention.keep_date = true;
//! config.output = OutputPolicy::cleaned_dir("./cleaned");
//! for path in &images {
//!     let report = strip_image(path, &config);
//!     if let Outcome::Failed(err) = &report.outcome {
//!         eprintln!("{}: {err}", path.display());
//!     }
//! }
//! ```
//!
//! ## In-memory use
//!
//! ```rust,no_run
//! use metaclean::config::Config;
//! use metaclean::pipeline::{StripOutcome, strip_bytes};
//!
//! let bytes = std::fs::read("photo.png").unwrap();
//! if let StripOutcome::Stripped(clean) = strip_bytes(&bytes, &Config::default()).unwrap() {
//!     std::fs::write("photo_clean.png", &clean.bytes).unwrap();
//! }
//! ```
//!
//! ## Modules
//!
//! - [`format`] — magic-byte sniffing
//! - [`exif`] — bounded IFD parsing, per-container metadata reading, IFD writing
//! - [`tags`] — tag identifiers, values and the classification table
//! - [`presence`] — the "has metadata" decision and scan records
//! - [`orientation`] — baking EXIF orientation into pixels
//! - [`rebuild`] — the minimal tag set a stripped image keeps
//! - [`container`] — per-format container rebuilders
//! - [`pipeline`] — per-image scan and strip runs
//! - [`output`] — output paths and atomic writes
//! - [`batch`] — worker pool
//! - [`config`] — policies
//! - [`error`] — error type

pub mod batch;
pub mod config;
pub mod container;
pub mod error;
pub mod exif;
pub mod format;
pub mod orientation;
pub mod output;
pub mod pipeline;
pub mod presence;
pub mod rebuild;
pub mod tags;

#[cfg(test)]
mod testutil;

pub use error::{Error, Result};

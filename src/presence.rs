//! "Does this image carry metadata worth reporting?"
//!
//! GPS, camera, copyright and date tags count. Orientation and the `Other`
//! bucket (exposure settings, resolution, comments, opaque blocks) do not:
//! an image whose only metadata is `Orientation = 1` is not a positive.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::format::ImageFormat;
use crate::tags::{Category, GpsPosition, TagSet};

/// Categories that make an image a positive.
pub const SIGNAL: [Category; 4] = [Category::Gps, Category::Camera, Category::Copyright, Category::DateTime];

/// One recognized tag, ready for printing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagReport {
    pub name: String,
    pub category: Category,
    pub value: String,
}

/// Scan output for one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub path: PathBuf,
    pub format: ImageFormat,
    pub has_metadata: bool,
    pub categories_present: BTreeSet<Category>,
    pub tags: Vec<TagReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsPosition>,
}

impl ScanResult {
    pub fn new(path: &Path, format: ImageFormat, tags: &TagSet) -> Self {
        Self {
            path: path.to_path_buf(),
            format,
            has_metadata: evaluate(tags),
            categories_present: tags.categories(),
            tags: tags
                .iter()
                .map(|t| TagReport {
                    name: t.name().to_string(),
                    category: t.category(),
                    value: t.value().to_string(),
                })
                .collect(),
            gps: tags.gps_position(),
        }
    }
}

pub fn evaluate(tags: &TagSet) -> bool {
    let present = tags.categories();
    SIGNAL.iter().any(|c| present.contains(c))
}

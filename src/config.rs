use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default JPEG quality for pixels re-encoded by an orientation rebake.
pub const DEFAULT_QUALITY: u8 = 95;

/// Resolved configuration for one metaclean run.
///
/// There is no configuration file: the CLI builds this from its flags and
/// passes it, unchanged, into every pipeline call. Nothing here is global.
///
/// # Example
///
/// ```rust
/// use metaclean::config::{Config, OutputMode};
///
/// let mut config = Config::default();
/// config.retention.keep_date = true;
/// config.retention.copyright = Some("© forfaxx".into());
///
/// // The safe default never targets the original file.
/// assert!(matches!(config.output.mode, OutputMode::CleanedDir(_)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Which metadata tags survive a strip.
    pub retention: RetentionPolicy,
    /// Which structural blocks (color profile, density) survive a strip.
    pub structure: StructurePolicy,
    /// Where stripped output goes.
    pub output: OutputPolicy,
    /// Encoder settings for pixels re-encoded by a rebake.
    pub encode: EncodeOptions,
    /// Process animated and multi-page images instead of skipping them.
    pub force: bool,
}

/// Which tags the rebuilder may write back.
///
/// Everything else is dropped. GPS and camera/device tags are never written,
/// whatever this says.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Keep the capture date (DateTimeOriginal, else DateTime).
    pub keep_date: bool,
    /// Keep the Orientation tag verbatim and skip the pixel rebake.
    pub keep_orientation: bool,
    /// Copyright string to inject. Empty or whitespace-only counts as unset.
    pub copyright: Option<String>,
}

impl RetentionPolicy {
    /// The copyright string to write, if one was supplied.
    pub fn copyright(&self) -> Option<&str> {
        self.copyright.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Structural blocks that are not metadata but are dropped by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructurePolicy {
    /// Keep the embedded ICC color profile.
    pub keep_icc: bool,
    /// Keep pixel density (JFIF density, `pHYs`, TIFF resolution).
    pub keep_dpi: bool,
}

/// Output placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Write `<dir>/<stem>_clean.<ext>`. Never touches the original.
    CleanedDir(PathBuf),
    /// Atomically replace the original after the rebuilt file validates.
    InPlace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPolicy {
    pub mode: OutputMode,
}

impl Default for OutputPolicy {
    fn default() -> Self {
        Self {
            mode: OutputMode::CleanedDir(default_output_dir()),
        }
    }
}

impl OutputPolicy {
    pub fn in_place() -> Self {
        Self {
            mode: OutputMode::InPlace,
        }
    }

    pub fn cleaned_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            mode: OutputMode::CleanedDir(dir.into()),
        }
    }

    pub fn is_in_place(&self) -> bool {
        self.mode == OutputMode::InPlace
    }
}

/// `~/Pictures/cleaned`, or `./cleaned` when there is no home directory.
pub fn default_output_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("Pictures"))
        .unwrap_or_default()
        .join("cleaned")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeOptions {
    /// JPEG quality, 1..=100.
    pub quality: u8,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
        }
    }
}

impl EncodeOptions {
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

//! Output placement and atomic writes.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::config::{OutputMode, OutputPolicy};
use crate::error::{Error, Result};

/// Where the cleaned copy of `input` goes.
///
/// In-place mode is the only mode that may resolve to `input` itself. In
/// cleaned-dir mode the target is `<dir>/<stem>_clean.<ext>`, and a target
/// that turns out to be the original is refused with
/// [`Error::UnsafeOutput`].
pub fn output_path(input: &Path, policy: &OutputPolicy) -> Result<PathBuf> {
    let dir = match &policy.mode {
        OutputMode::InPlace => return Ok(input.to_path_buf()),
        OutputMode::CleanedDir(dir) => dir,
    };

    let stem = input.file_stem().ok_or_else(|| {
        Error::io(input, io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))
    })?;
    let mut name = stem.to_os_string();
    name.push("_clean");
    if let Some(ext) = input.extension() {
        name.push(".");
        name.push(ext);
    }
    let target = dir.join(name);

    if same_file(input, &target) {
        return Err(Error::UnsafeOutput { path: input.to_path_buf() });
    }
    Ok(target)
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Write `bytes` to a temporary file next to `target` and rename it into
/// place. Parent directories are created on demand. When `target` already
/// exists its permissions carry over to the replacement.
pub fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| Error::io(parent, e))?;
    tmp.write_all(bytes).map_err(|e| Error::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| Error::io(tmp.path(), e))?;
    if let Ok(meta) = fs::metadata(target) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(|e| Error::io(target, e))?;
    }

    tmp.persist(target).map_err(|e| Error::io(target, e.error))?;
    log::debug!("wrote {} bytes to {}", bytes.len(), target.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ── output_path ──

    #[test]
    fn cleaned_dir_name() {
        let policy = OutputPolicy::cleaned_dir("/out");
        assert_eq!(
            output_path(Path::new("/photos/IMG_1.JPG"), &policy).unwrap(),
            PathBuf::from("/out/IMG_1_clean.JPG")
        );
        assert_eq!(
            output_path(Path::new("noext"), &policy).unwrap(),
            PathBuf::from("/out/noext_clean")
        );
    }

    #[test]
    fn in_place_is_the_input() {
        let input = Path::new("/photos/a.png");
        assert_eq!(output_path(input, &OutputPolicy::in_place()).unwrap(), input);
    }

    #[test]
    fn cleaned_dir_never_resolves_to_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a_clean.jpg");
        fs::write(&input, b"x").unwrap();

        let policy = OutputPolicy::cleaned_dir(dir.path());
        let target = output_path(&input, &policy).unwrap();
        assert_ne!(target, input);
        assert_eq!(target.file_name().unwrap(), "a_clean_clean.jpg");
    }

    #[test]
    fn rejects_path_without_name() {
        assert!(matches!(
            output_path(Path::new("/"), &OutputPolicy::cleaned_dir("/out")),
            Err(Error::Io { .. })
        ));
    }

    // ── write_atomic ──

    #[test]
    fn creates_directories_and_replaces() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested/deeper/out.jpg");

        write_atomic(&target, b"first").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"first");

        write_atomic(&target, b"second").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"second");

        // No temporary files left behind.
        let entries = fs::read_dir(target.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }
}

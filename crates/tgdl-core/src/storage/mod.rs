//! On-disk layout of downloaded media and file lifecycle.
//!
//! Files live at `<root>/<sanitized label>/<filename>`. Transfers write to a
//! `.part` sibling that is renamed into place on success, so the final path
//! only ever holds complete files.

mod files;
mod sanitize;

use std::io;
use std::path::{Path, PathBuf};

pub use files::{list_downloads, StoredFile};
pub use sanitize::{sanitize_filename, sanitize_label};

/// Temporary file suffix used before the rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Folder for one source label under `root`.
pub fn label_dir(root: &Path, source_label: &str) -> PathBuf {
    root.join(sanitize_label(source_label))
}

/// Path for the temp file: `clip.mp4` → `clip.mp4.part`.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Creates the label folder (and parents).
pub async fn prepare_dir(dir: &Path) -> io::Result<()> {
    tokio::fs::create_dir_all(dir).await
}

/// Size of an existing regular file at `path`, if any.
pub async fn existing_size(path: &Path) -> Option<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Some(meta.len()),
        _ => None,
    }
}

/// True if `path` already holds a file of exactly `size` bytes.
pub async fn already_downloaded(path: &Path, size: u64) -> bool {
    existing_size(path).await == Some(size)
}

/// Moves a finished temp file into place, replacing any stale file.
pub async fn finalize(temp: &Path, final_path: &Path) -> io::Result<u64> {
    tokio::fs::rename(temp, final_path).await?;
    Ok(tokio::fs::metadata(final_path).await?.len())
}

/// Deletes the temp file a failed or cancelled transfer left behind. The
/// final path is never touched: a transfer only ever writes `temp`. A missing
/// file is fine; other errors are logged and swallowed.
pub async fn remove_partial(temp: &Path) {
    match tokio::fs::remove_file(temp).await {
        Ok(()) => tracing::debug!(path = %temp.display(), "removed partial file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %temp.display(), "could not remove partial file: {}", e),
    }
}

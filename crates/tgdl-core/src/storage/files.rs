//! Listing of already-downloaded media under the download root.

use std::fs;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use super::TEMP_SUFFIX;

/// One downloaded file, as `<folder>/<filename>` under the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub folder: String,
    pub filename: String,
    pub size: u64,
    /// Modification time, seconds since the Unix epoch.
    pub modified: Option<u64>,
}

/// Lists finished files one level below `root`, sorted by folder then name.
/// Temp files and anything not in a folder are skipped. A missing root is an
/// empty listing.
pub fn list_downloads(root: &Path) -> io::Result<Vec<StoredFile>> {
    let folders = match fs::read_dir(root) {
        Ok(rd) => rd,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut out = Vec::new();
    for folder in folders {
        let folder = folder?;
        if !folder.file_type()?.is_dir() {
            continue;
        }
        let folder_name = folder.file_name().to_string_lossy().into_owned();
        for entry in fs::read_dir(folder.path())? {
            let entry = entry?;
            let meta = entry.metadata()?;
            let filename = entry.file_name().to_string_lossy().into_owned();
            if !meta.is_file() || filename.ends_with(TEMP_SUFFIX) {
                continue;
            }
            let modified = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs());
            out.push(StoredFile {
                folder: folder_name.clone(),
                filename,
                size: meta.len(),
                modified,
            });
        }
    }
    out.sort_by(|a, b| (&a.folder, &a.filename).cmp(&(&b.folder, &b.filename)));
    Ok(out)
}

//! `tgdl files` – list what has been downloaded.

use anyhow::{Context, Result};
use tgdl_core::config::TgdlConfig;
use tgdl_core::media::format_size;
use tgdl_core::storage::list_downloads;

pub fn run_files(cfg: &TgdlConfig) -> Result<()> {
    let root = cfg.download_root();
    let files = list_downloads(&root)
        .with_context(|| format!("read download folder {}", root.display()))?;
    if files.is_empty() {
        println!("No downloads in {}.", root.display());
        return Ok(());
    }
    println!("{:<24} {:<10} {}", "FOLDER", "SIZE", "FILE");
    let mut total = 0u64;
    for f in &files {
        total += f.size;
        println!("{:<24} {:<10} {}", f.folder, format_size(f.size), f.filename);
    }
    println!("{} file(s), {}", files.len(), format_size(total));
    Ok(())
}

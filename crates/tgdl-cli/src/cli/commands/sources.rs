//! `tgdl sources` – list channels and groups.

use anyhow::Result;
use tgdl_core::config::TgdlConfig;

use crate::cli::open_session;

pub async fn run_sources(cfg: &TgdlConfig, limit: usize) -> Result<()> {
    let session = open_session(cfg).await?;
    let sources = session.scheduler.catalog().sources(limit).await?;
    if sources.is_empty() {
        println!("No sources.");
    } else {
        println!("{:<20} {:<8} {}", "ID", "KIND", "NAME");
        for s in sources {
            println!(
                "{:<20} {:<8} {}",
                s.id,
                format!("{:?}", s.kind).to_lowercase(),
                s.name
            );
        }
    }
    session.shutdown();
    Ok(())
}

//! `tgdl list <source>` – list media items of a source.

use anyhow::Result;
use tgdl_core::config::TgdlConfig;
use tgdl_core::media::{format_duration, format_size, ItemOrigin};

use crate::cli::{find_source, open_session};

pub async fn run_list(
    cfg: &TgdlConfig,
    source: &str,
    limit: usize,
    related: bool,
    refresh: bool,
    json: bool,
) -> Result<()> {
    let session = open_session(cfg).await?;
    let src = find_source(&session, source).await?;
    let listing = session
        .scheduler
        .catalog()
        .list(src.id, limit, related, refresh)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(listing.items.as_slice())?);
    } else if listing.items.is_empty() {
        println!("No media in the last {limit} messages of {}.", src.name);
    } else {
        println!(
            "{:<20} {:<10} {:<9} {:<12} {}",
            "ID", "SIZE", "LENGTH", "ORIGIN", "NAME"
        );
        for item in listing.items.iter() {
            let origin = match item.origin {
                ItemOrigin::Main => "post".to_string(),
                ItemOrigin::Reply { parent_id } => format!("reply:{parent_id}"),
            };
            println!(
                "{:<20} {:<10} {:<9} {:<12} {}",
                item.item_id,
                format_size(item.size),
                format_duration(item.duration_secs),
                origin,
                item.file_name()
            );
        }
    }
    session.shutdown();
    Ok(())
}

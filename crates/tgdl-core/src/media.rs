//! Descriptors of remote sources and media items, plus display helpers.

use serde::{Deserialize, Serialize};

use crate::registry::TaskId;
use crate::storage::sanitize_filename;

/// Kind of a remote container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Channel,
    Group,
    Private,
}

/// A remote container (channel, group, conversation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub id: i64,
    pub name: String,
    pub kind: SourceKind,
}

/// Where an item was found while scanning a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ItemOrigin {
    /// Posted directly in the source.
    Main,
    /// Posted in the comment thread of message `parent_id`.
    Reply { parent_id: i64 },
}

/// Last-seen description of a downloadable media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    pub source_id: i64,
    pub item_id: i64,
    /// Filename attached to the media, if the sender provided one.
    pub filename: Option<String>,
    pub size: u64,
    pub duration_secs: u32,
    pub has_thumbnail: bool,
    /// Posting time, `YYYY-MM-DD HH:MM`.
    pub date: Option<String>,
    pub origin: ItemOrigin,
}

impl ItemDescriptor {
    pub fn task_id(&self) -> TaskId {
        TaskId::new(self.source_id, self.item_id)
    }

    /// Name to save under: the attached filename sanitized, or
    /// `video_<item_id>.mp4` when there is none (or nothing usable is left).
    pub fn file_name(&self) -> String {
        self.filename
            .as_deref()
            .map(sanitize_filename)
            .filter(|s| !s.is_empty() && s != "." && s != "..")
            .unwrap_or_else(|| format!("video_{}.mp4", self.item_id))
    }
}

/// Human-readable size: `512.0B`, `1.5KB`, ... `2.0TB`.
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{value:.1}{unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.1}TB")
}

/// `m:ss`, or `h:mm:ss` from one hour up.
pub fn format_duration(secs: u32) -> String {
    let (h, rest) = (secs / 3600, secs % 3600);
    let (m, s) = (rest / 60, rest % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(filename: Option<&str>) -> ItemDescriptor {
        ItemDescriptor {
            source_id: 5,
            item_id: 77,
            filename: filename.map(str::to_string),
            size: 10,
            duration_secs: 0,
            has_thumbnail: false,
            date: None,
            origin: ItemOrigin::Main,
        }
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(0), "0.0B");
        assert_eq!(format_size(1536), "1.5KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024 * 1024), "3.0TB");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(5), "0:05");
        assert_eq!(format_duration(125), "2:05");
        assert_eq!(format_duration(3725), "1:02:05");
    }

    #[test]
    fn file_name_fallback() {
        assert_eq!(item(Some("talk.mp4")).file_name(), "talk.mp4");
        assert_eq!(item(Some("../../etc/passwd")).file_name(), "etc_passwd");
        assert_eq!(item(None).file_name(), "video_77.mp4");
        assert_eq!(item(Some("..")).file_name(), "video_77.mp4");
    }

    #[test]
    fn origin_serializes_tagged() {
        let json = serde_json::to_string(&ItemOrigin::Reply { parent_id: 9 }).unwrap();
        assert_eq!(json, r#"{"type":"reply","parent_id":9}"#);
    }
}

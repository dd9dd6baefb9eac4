use super::AudioFormat;
use chrono::{DateTime, Utc};
use id3::TagLike;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// One entry of the user's list. Immutable once created; the catalog only
/// ever inserts or deletes whole records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    id: Uuid,
    title: String,
    source: String, // opaque locator, a file path for the rodio backend
    added_at: DateTime<Utc>,
}

impl Track {
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            source: source.into(),
            added_at: Utc::now(),
        }
    }

    /// Rebuild a stored record as it was written.
    pub fn from_parts(
        id: Uuid,
        title: impl Into<String>,
        source: impl Into<String>,
        added_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            source: source.into(),
            added_at,
        }
    }

    /// Build a track for a picked file. The title comes from the file's tags
    /// when it carries one, else from the file name.
    pub fn from_path(path: &Path) -> Self {
        let title = read_tag_title(path).unwrap_or_else(|| file_stem_title(path));
        Self::new(title, path.to_string_lossy())
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat::from_path(Path::new(&self.source))
    }

    pub fn is_playable(&self) -> bool {
        self.format().is_supported() && Path::new(&self.source).exists()
    }
}

fn read_tag_title(path: &Path) -> Option<String> {
    let title = match AudioFormat::from_path(path) {
        AudioFormat::Mp3 => id3::Tag::read_from_path(path)
            .ok()?
            .title()
            .map(|s| s.to_string()),
        AudioFormat::Mp4 => mp4ameta::Tag::read_from_path(path)
            .ok()?
            .title()
            .map(|s| s.to_string()),
        _ => None,
    };

    title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn file_stem_title(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("Unknown")
        .to_string()
}

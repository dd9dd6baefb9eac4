pub mod cursor;
pub mod stream;
pub mod track;

#[cfg(feature = "audio")]
pub mod rodio_backend;

pub use cursor::PlaylistCursor;
pub use stream::{
    LoadResult, LoadTicket, MediaBackend, MediaStream, PlayerError, PrepareOutcome, Prepared,
    StreamPlayer,
};
pub use track::Track;

#[cfg(feature = "audio")]
pub use rodio_backend::RodioBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Flac,
    Ogg,
    Mp4,
    Wav,
    Unknown,
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "mp3" => AudioFormat::Mp3,
            "flac" => AudioFormat::Flac,
            "ogg" | "oga" => AudioFormat::Ogg,
            "mp4" | "m4a" | "aac" => AudioFormat::Mp4,
            "wav" => AudioFormat::Wav,
            _ => AudioFormat::Unknown,
        }
    }

    pub fn from_path(path: &std::path::Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(AudioFormat::from_extension)
            .unwrap_or(AudioFormat::Unknown)
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, AudioFormat::Unknown)
    }
}

use lofty::picture::MimeType;
use lofty::prelude::*;
use lofty::probe::Probe;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Lofty error: {0}")]
    Lofty(#[from] lofty::error::LoftyError),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Bitrate recorded when the container does not report one (CD quality).
pub const DEFAULT_BITRATE_KBPS: u32 = 1411;

/// Channel count from which a lossless file is flagged as Dolby Atmos capable.
const ATMOS_MIN_CHANNELS: u8 = 6;

/// Audio containers accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AudioFormat {
    Flac,
    Wav,
    Mp3,
}

impl AudioFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "flac" => Some(Self::Flac),
            "wav" => Some(Self::Wav),
            "mp3" => Some(Self::Mp3),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Upper-case tag stored on the song record.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Flac => "FLAC",
            Self::Wav => "WAV",
            Self::Mp3 => "MP3",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }

    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Flac | Self::Wav)
    }

    /// Whether a client-declared MIME type is plausible for this format.
    /// Browsers disagree on the exact names, hence the aliases.
    pub fn accepts_mime(&self, mime: &str) -> bool {
        let mime = mime.to_lowercase();
        if mime == "application/octet-stream" {
            return true;
        }
        match self {
            Self::Flac => matches!(mime.as_str(), "audio/flac" | "audio/x-flac"),
            Self::Wav => matches!(
                mime.as_str(),
                "audio/wav" | "audio/x-wav" | "audio/wave" | "audio/vnd.wave"
            ),
            Self::Mp3 => matches!(mime.as_str(), "audio/mpeg" | "audio/mp3" | "audio/x-mp3"),
        }
    }

    /// Check the leading bytes against the container signature.
    pub fn matches_magic_bytes(&self, data: &[u8]) -> bool {
        if data.len() < 12 {
            return false;
        }
        match self {
            // ID3 tag or MPEG frame sync
            Self::Mp3 => data.starts_with(b"ID3") || (data[0] == 0xFF && (data[1] & 0xE0) == 0xE0),
            Self::Flac => data.starts_with(b"fLaC"),
            Self::Wav => data.starts_with(b"RIFF") && &data[8..12] == b"WAVE",
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Artwork embedded in the file's tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverArt {
    pub data: Vec<u8>,
    /// File extension matching the image type (`jpg`, `png`, ...)
    pub extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<u32>,
    pub duration_secs: f64,
    pub bitrate: Option<u32>,
    pub channels: Option<u8>,
    pub format: AudioFormat,
    pub file_size: u64,
    #[serde(skip)]
    pub cover_art: Option<CoverArt>,
}

impl AudioMetadata {
    pub fn bitrate_or_default(&self) -> u32 {
        self.bitrate.filter(|b| *b > 0).unwrap_or(DEFAULT_BITRATE_KBPS)
    }

    /// Multichannel (5.1 and up) lossless files are treated as Atmos capable.
    pub fn has_dolby_atmos(&self) -> bool {
        self.format.is_lossless() && self.channels.unwrap_or(0) >= ATMOS_MIN_CHANNELS
    }
}

fn picture_extension(mime: Option<&MimeType>) -> &'static str {
    match mime {
        Some(MimeType::Png) => "png",
        Some(MimeType::Gif) => "gif",
        Some(MimeType::Bmp) => "bmp",
        Some(MimeType::Tiff) => "tiff",
        _ => "jpg",
    }
}

/// Extract metadata from an audio file using lofty
pub fn extract_metadata_from_file(path: &Path) -> Result<AudioMetadata, MetadataError> {
    let format = AudioFormat::from_path(path).ok_or_else(|| {
        MetadataError::UnsupportedFormat(
            path.extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase(),
        )
    })?;

    let file_size = std::fs::metadata(path)?.len();
    let tagged_file = Probe::open(path)?.read()?;

    let properties = tagged_file.properties();
    let duration_secs = properties.duration().as_secs_f64();
    let bitrate = properties.audio_bitrate();
    let channels = properties.channels();

    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag());

    let (title, artist, album, genre, year, cover_art) = if let Some(tag) = tag {
        let cover = tag.pictures().first().map(|p| CoverArt {
            data: p.data().to_vec(),
            extension: picture_extension(p.mime_type()).to_string(),
        });

        (
            tag.title().map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
            tag.artist().map(|a| a.trim().to_string()).filter(|a| !a.is_empty()),
            tag.album().map(|a| a.trim().to_string()).filter(|a| !a.is_empty()),
            tag.genre().map(|g| g.trim().to_string()).filter(|g| !g.is_empty()),
            tag.year(),
            cover,
        )
    } else {
        (None, None, None, None, None, None)
    };

    Ok(AudioMetadata {
        title,
        artist,
        album,
        genre,
        year,
        duration_secs,
        bitrate,
        channels,
        format,
        file_size,
        cover_art,
    })
}

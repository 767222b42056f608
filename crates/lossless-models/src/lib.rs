//! Record types exchanged between the server and the player.
//!
//! The server builds these from its database rows; the player deserializes
//! them from API responses and keeps [`Song`] values in its queue. Keeping a
//! single definition means both sides agree on field names and shapes.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cover image served when a song has no embedded artwork.
pub const DEFAULT_COVER: &str = "default-cover.png";

/// A catalog entry as exposed over the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: Uuid,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub release_date: Option<String>,
    pub duration_secs: f64,
    /// Upper-case container tag: `FLAC`, `WAV` or `MP3`
    pub format: String,
    /// Kilobits per second
    pub bitrate: i32,
    pub has_dolby_atmos: bool,
    pub play_count: i64,
    pub cover_url: String,
    pub added_by: Uuid,
    pub created_at: DateTime<FixedOffset>,
}

impl Song {
    /// Relative API path of this song's audio stream.
    pub fn stream_path(&self) -> String {
        format!("/api/songs/{}/stream", self.id)
    }
}

/// Build the public URL for a stored cover filename.
pub fn cover_url(cover_art: Option<&str>) -> String {
    format!("/api/songs/cover/{}", cover_art.unwrap_or(DEFAULT_COVER))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub owner_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub song_count: Option<u64>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

/// One slot of a playlist. The same song may occupy several slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub position: i32,
    pub added_at: DateTime<FixedOffset>,
    pub song: Song,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistDetail {
    #[serde(flatten)]
    pub playlist: Playlist,
    pub songs: Vec<PlaylistEntry>,
}

impl PlaylistDetail {
    /// Songs in playlist order, ready to hand to a playback queue.
    pub fn queue(&self) -> Vec<Song> {
        self.songs.iter().map(|e| e.song.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: PublicUser,
    pub playlists: Vec<Playlist>,
}

/// Request body for adding listened seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ListeningTimeUpdate {
    pub time_in_seconds: f64,
}

/// A user's running listening total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListeningTime {
    pub listening_time: f64,
    pub formatted_time: String,
}

impl ListeningTime {
    pub fn new(seconds: f64) -> Self {
        Self {
            listening_time: seconds,
            formatted_time: format_listening_time(seconds),
        }
    }
}

/// `"{h}h {m}m"` once an hour has accumulated, `"{m}m"` before that.
pub fn format_listening_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

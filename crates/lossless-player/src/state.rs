use lossless_models::Song;
use serde::{Deserialize, Serialize};

pub const DEFAULT_VOLUME: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    None,
    One,
    All,
}

impl RepeatMode {
    /// none → one → all → none
    pub fn next(self) -> Self {
        match self {
            Self::None => Self::One,
            Self::One => Self::All,
            Self::All => Self::None,
        }
    }
}

/// Transport and queue state owned by a single controller.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub current_song: Option<Song>,
    pub queue: Vec<Song>,
    /// Queue position of `current_song`. `None` when nothing plays or the
    /// playing entry was removed from the queue.
    pub current_index: Option<usize>,
    pub is_playing: bool,
    pub is_loading: bool,
    /// 0.0 ..= 1.0
    pub volume: f64,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub current_time: f64,
    pub duration: f64,
    /// 0.0 ..= 100.0
    pub progress: f64,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_song: None,
            queue: Vec::new(),
            current_index: None,
            is_playing: false,
            is_loading: false,
            volume: DEFAULT_VOLUME,
            shuffle: false,
            repeat: RepeatMode::None,
            current_time: 0.0,
            duration: 0.0,
            progress: 0.0,
        }
    }
}

impl PlaybackState {
    pub fn is_current(&self, song: &Song) -> bool {
        self.current_song.as_ref().is_some_and(|c| c.id == song.id)
    }

    /// Reset position-related fields for a freshly loaded source.
    pub(crate) fn reset_position(&mut self) {
        self.current_time = 0.0;
        self.duration = 0.0;
        self.progress = 0.0;
    }
}

use lossless_models::Song;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;

use crate::media::{MediaOutput, PlayError};
use crate::state::{PlaybackState, RepeatMode};

/// Drives one [`MediaOutput`] from queue and transport commands.
///
/// All operations take `&mut self`, so transitions never interleave; the only
/// await point is the media output's `play`.
pub struct PlaybackController<M: MediaOutput> {
    media: M,
    state: PlaybackState,
    /// Server origin prepended to `Song::stream_path`.
    base_url: String,
    rng: StdRng,
    playing_tx: watch::Sender<bool>,
}

impl<M: MediaOutput> PlaybackController<M> {
    pub fn new(media: M, base_url: impl Into<String>) -> Self {
        Self::with_rng(media, base_url, StdRng::from_os_rng())
    }

    /// Controller with a caller-supplied RNG for shuffle.
    pub fn with_rng(mut media: M, base_url: impl Into<String>, rng: StdRng) -> Self {
        let state = PlaybackState::default();
        media.set_volume(state.volume);
        let (playing_tx, _) = watch::channel(false);
        Self {
            media,
            state,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rng,
            playing_tx,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    /// Receiver that observes every change of the playing flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.playing_tx.subscribe()
    }

    pub fn stream_url(&self, song: &Song) -> String {
        format!("{}{}", self.base_url, song.stream_path())
    }

    // ─── Queue ─────────────────────────────────────────────────────

    /// Play `song`: switch to it if already queued, otherwise insert it right
    /// after the current entry (or at the end when nothing is current).
    pub async fn play_song(&mut self, song: Song) {
        let queued = self
            .state
            .current_index
            .filter(|_| self.state.is_current(&song))
            .or_else(|| self.state.queue.iter().position(|s| s.id == song.id));

        let index = match (queued, self.state.current_index) {
            (Some(index), _) => index,
            (None, Some(current)) => {
                self.state.queue.insert(current + 1, song);
                current + 1
            }
            (None, None) => {
                self.state.queue.push(song);
                self.state.queue.len() - 1
            }
        };
        self.switch_to(index, false).await;
    }

    /// Replace the queue and start at `start_index` (clamped).
    pub async fn play_queue(&mut self, songs: Vec<Song>, start_index: usize) {
        if songs.is_empty() {
            self.clear_queue();
            return;
        }
        let start = start_index.min(songs.len() - 1);
        self.state.queue = songs;
        self.switch_to(start, true).await;
    }

    pub fn add_to_queue(&mut self, song: Song) {
        self.state.queue.push(song);
    }

    /// Remove the entry at `index`. The current song keeps playing even if it
    /// was the one removed; it just no longer has a queue position.
    pub fn remove_from_queue(&mut self, index: usize) -> Option<Song> {
        if index >= self.state.queue.len() {
            return None;
        }
        let removed = self.state.queue.remove(index);
        self.state.current_index = match self.state.current_index {
            Some(current) if current == index => None,
            Some(current) if current > index => Some(current - 1),
            current => current,
        };
        Some(removed)
    }

    pub fn clear_queue(&mut self) {
        self.state.queue.clear();
        self.stop();
    }

    // ─── Navigation ────────────────────────────────────────────────

    pub async fn play_next(&mut self) {
        match self.next_index() {
            Some(index) => self.switch_to(index, true).await,
            None => self.stop(),
        }
    }

    pub async fn play_previous(&mut self) {
        if let Some(index) = self.previous_index() {
            self.switch_to(index, true).await;
        }
    }

    fn next_index(&mut self) -> Option<usize> {
        let len = self.state.queue.len();
        if len == 0 {
            return None;
        }
        let current = self.state.current_index;
        if self.state.shuffle {
            return Some(self.random_other(len, current));
        }
        Some(current.map_or(0, |i| (i + 1) % len))
    }

    fn previous_index(&mut self) -> Option<usize> {
        let len = self.state.queue.len();
        if len == 0 {
            return None;
        }
        let current = self.state.current_index;
        if self.state.shuffle {
            return Some(self.random_other(len, current));
        }
        Some(current.map_or(len - 1, |i| (i + len - 1) % len))
    }

    /// Uniform pick among the indices other than `current`.
    fn random_other(&mut self, len: usize, current: Option<usize>) -> usize {
        match current.filter(|&c| c < len) {
            _ if len <= 1 => 0,
            Some(current) => {
                let pick = self.rng.random_range(0..len - 1);
                if pick >= current {
                    pick + 1
                } else {
                    pick
                }
            }
            None => self.rng.random_range(0..len),
        }
    }

    // ─── Transport ─────────────────────────────────────────────────

    pub async fn toggle_play(&mut self) {
        if self.state.is_playing {
            self.set_playing(false);
            self.media.pause();
            return;
        }
        if self.state.current_song.is_none() {
            return;
        }
        self.set_playing(true);
        if !self.state.is_loading {
            self.start_playback().await;
        }
    }

    pub fn toggle_shuffle(&mut self) {
        self.state.shuffle = !self.state.shuffle;
    }

    pub fn toggle_repeat(&mut self) {
        self.state.repeat = self.state.repeat.next();
    }

    /// Forwarded as-is; the media output clamps.
    pub fn seek_to(&mut self, seconds: f64) {
        self.media.set_current_time(seconds);
    }

    pub fn set_volume(&mut self, volume: f64) {
        if volume.is_nan() {
            return;
        }
        self.state.volume = volume.clamp(0.0, 1.0);
        self.media.set_volume(self.state.volume);
    }

    pub fn set_progress(&mut self, progress: f64) {
        if progress.is_nan() {
            return;
        }
        self.state.progress = progress.clamp(0.0, 100.0);
    }

    // ─── Media events ──────────────────────────────────────────────

    pub fn on_time_update(&mut self) {
        let current = self.media.current_time();
        let duration = self.media.duration();
        self.state.current_time = current;
        let progress = if duration.is_finite() && duration > 0.0 {
            current / duration * 100.0
        } else {
            0.0
        };
        self.set_progress(progress);
    }

    pub fn on_loaded_metadata(&mut self) {
        let duration = self.media.duration();
        self.state.duration = if duration.is_finite() { duration } else { 0.0 };
    }

    /// The new source is ready; start it if the user asked to play.
    pub async fn on_can_play(&mut self) {
        self.state.is_loading = false;
        if self.state.is_playing {
            self.start_playback().await;
        }
    }

    pub async fn on_ended(&mut self) {
        match self.state.repeat {
            RepeatMode::One => {
                self.media.set_current_time(0.0);
                self.state.current_time = 0.0;
                self.start_playback().await;
            }
            RepeatMode::All => self.play_next().await,
            RepeatMode::None => {
                let last = self.state.queue.len().checked_sub(1);
                let at_end = self.state.current_index == last;
                if self.state.queue.is_empty() || (at_end && !self.state.shuffle) {
                    self.stop();
                } else {
                    self.play_next().await;
                }
            }
        }
    }

    pub fn on_error(&mut self, message: &str) {
        tracing::error!(
            song_id = ?self.state.current_song.as_ref().map(|s| s.id),
            "media error: {message}"
        );
        self.state.is_loading = false;
        self.set_playing(false);
    }

    // ─── Internals ─────────────────────────────────────────────────

    /// Make the queue entry at `index` current and mark playing. A different
    /// song loads a new source; the same song restarts only when `restart`
    /// is set.
    async fn switch_to(&mut self, index: usize, restart: bool) {
        let Some(song) = self.state.queue.get(index).cloned() else {
            return;
        };
        self.state.current_index = Some(index);
        self.set_playing(true);

        if self.state.is_current(&song) {
            if restart {
                self.media.set_current_time(0.0);
                self.state.current_time = 0.0;
                self.state.progress = 0.0;
            }
            if !self.state.is_loading {
                self.start_playback().await;
            }
            return;
        }

        let url = self.stream_url(&song);
        tracing::debug!(song_id = %song.id, index, %url, "loading source");
        self.state.current_song = Some(song);
        self.state.is_loading = true;
        self.state.reset_position();
        self.media.load(&url);
    }

    async fn start_playback(&mut self) {
        match self.media.play().await {
            Ok(()) => {}
            Err(PlayError::Aborted) => {
                tracing::debug!("play request superseded");
            }
            Err(e) => {
                tracing::error!("error playing audio: {e}");
                self.state.is_loading = false;
                self.set_playing(false);
            }
        }
    }

    fn stop(&mut self) {
        self.set_playing(false);
        self.media.pause();
        self.state.current_song = None;
        self.state.current_index = None;
        self.state.is_loading = false;
        self.state.reset_position();
    }

    fn set_playing(&mut self, playing: bool) {
        self.state.is_playing = playing;
        self.playing_tx.send_replace(playing);
    }
}

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlayError {
    /// The pending play was superseded by a pause or a new source.
    #[error("play request aborted")]
    Aborted,
    #[error("playback not allowed: {0}")]
    NotAllowed(String),
    #[error("source not supported: {0}")]
    NotSupported(String),
    #[error("playback failed: {0}")]
    Other(String),
}

/// The element that actually renders audio (an HTML audio element, a native
/// sink, a test double). Times are in seconds.
#[async_trait]
pub trait MediaOutput: Send {
    /// Replace the source and start fetching it.
    fn load(&mut self, url: &str);

    /// Resolve once playback has actually started.
    async fn play(&mut self) -> Result<(), PlayError>;

    fn pause(&mut self);

    fn set_current_time(&mut self, seconds: f64);

    fn current_time(&self) -> f64;

    /// NaN until metadata is known.
    fn duration(&self) -> f64;

    fn set_volume(&mut self, volume: f64);
}

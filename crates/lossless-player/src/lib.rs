//! Client-side playback: a controller that keeps queue and transport state in
//! step with a media output, plus listening-time accrual against the server.

pub mod client;
pub mod controller;
pub mod listening;
pub mod media;
pub mod state;

pub use client::{ApiClient, ClientError};
pub use controller::PlaybackController;
pub use listening::{ListeningClock, ListeningTimeSink};
pub use media::{MediaOutput, PlayError};
pub use state::{PlaybackState, RepeatMode};

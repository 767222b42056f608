use async_trait::async_trait;
use lossless_models::ListeningTime;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use crate::client::ClientError;

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Where accrued listening seconds are reported.
#[async_trait]
pub trait ListeningTimeSink: Send + Sync {
    async fn add_listening_time(&self, seconds: f64) -> Result<ListeningTime, ClientError>;
}

/// Accrues wall-clock seconds while the controller reports playing and
/// flushes them to a [`ListeningTimeSink`]. Unsent seconds are kept until
/// a later flush succeeds.
pub struct ListeningClock {
    sink: Arc<dyn ListeningTimeSink>,
    playing: watch::Receiver<bool>,
    pending: f64,
    total: Option<ListeningTime>,
}

impl ListeningClock {
    pub fn new(sink: Arc<dyn ListeningTimeSink>, playing: watch::Receiver<bool>) -> Self {
        Self {
            sink,
            playing,
            pending: 0.0,
            total: None,
        }
    }

    /// Seconds not yet acknowledged by the sink.
    pub fn pending(&self) -> f64 {
        self.pending
    }

    /// Last total confirmed by the sink.
    pub fn total(&self) -> Option<&ListeningTime> {
        self.total.as_ref()
    }

    /// Account for `elapsed` and try to flush.
    pub async fn tick(&mut self, elapsed: Duration) {
        if *self.playing.borrow() {
            self.pending += elapsed.as_secs_f64();
        }
        self.flush().await;
    }

    async fn flush(&mut self) {
        if self.pending <= 0.0 {
            return;
        }
        match self.sink.add_listening_time(self.pending).await {
            Ok(total) => {
                tracing::trace!(added = self.pending, total = total.listening_time, "listening time flushed");
                self.total = Some(total);
                self.pending = 0.0;
            }
            Err(e) => {
                tracing::warn!(pending = self.pending, "failed to record listening time: {e}");
            }
        }
    }

    /// Tick every second until the controller's playing channel closes, then
    /// make a final flush attempt.
    pub async fn run(mut self) -> Self {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;
        let mut last = Instant::now();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Instant::now();
                    self.tick(now - last).await;
                    last = now;
                }
                changed = self.playing.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.flush().await;
        self
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<Self> {
        tokio::spawn(self.run())
    }
}

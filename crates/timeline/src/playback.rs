use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::{Seconds, TimelineEditor};

pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

// absorbs float drift from summing timer periods
const END_EPSILON: Seconds = 1e-9;

/// What happens when the cursor reaches the end of the timeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// Reset to zero and stop.
    #[default]
    Stop,
    /// Reset to zero and keep playing.
    Loop,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackTick {
    pub position: Seconds,
    pub playing: bool,
    pub wrapped: bool,
}

#[derive(Debug, Clone)]
pub struct PlaybackClock {
    playing: bool,
    rate: f64, // 1.0 = normal
    position: Seconds,
    duration: Seconds,
    end: PlaybackEnd,
}

impl PlaybackClock {
    pub fn new(duration: Seconds) -> Self {
        Self {
            playing: false,
            rate: 1.0,
            position: 0.0,
            duration: duration.max(0.0),
            end: PlaybackEnd::default(),
        }
    }

    pub fn with_end(mut self, end: PlaybackEnd) -> Self {
        self.end = end;
        self
    }

    pub fn position(&self) -> Seconds {
        self.position
    }

    pub fn duration(&self) -> Seconds {
        self.duration
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn end(&self) -> PlaybackEnd {
        self.end
    }

    pub fn set_end(&mut self, end: PlaybackEnd) {
        self.end = end;
    }

    pub fn play(&mut self) {
        if self.duration > 0.0 {
            self.playing = true;
        }
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn set_rate(&mut self, rate: f64) {
        if rate.is_finite() && rate > 0.0 {
            self.rate = rate;
        }
    }

    pub fn seek_to(&mut self, position: Seconds) {
        self.position = if position.is_finite() {
            position.clamp(0.0, self.duration)
        } else {
            0.0
        };
    }

    pub fn set_duration(&mut self, duration: Seconds) {
        self.duration = duration.max(0.0);
        if self.position > self.duration {
            self.position = 0.0;
        }
        if self.duration == 0.0 {
            self.playing = false;
        }
    }

    /// Advances by one timer period. Reaching the end resets the cursor to zero.
    pub fn advance(&mut self, dt: Duration) -> PlaybackTick {
        if !self.playing {
            return self.tick(false);
        }
        let next = self.position + dt.as_secs_f64() * self.rate;
        if next >= self.duration - END_EPSILON {
            self.position = 0.0;
            if self.end == PlaybackEnd::Stop {
                self.playing = false;
            }
            return self.tick(true);
        }
        self.position = next;
        self.tick(false)
    }

    fn tick(&self, wrapped: bool) -> PlaybackTick {
        PlaybackTick {
            position: self.position,
            playing: self.playing,
            wrapped,
        }
    }
}

/// Repeating timer that drives an editor's cursor while it is playing.
pub struct PlaybackDriver {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl PlaybackDriver {
    /// Spawns the timer task. The task ends on its own once playback stops.
    pub fn spawn<F>(editor: Arc<Mutex<TimelineEditor>>, period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut(PlaybackTick) + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // first tick completes immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        tracing::debug!(target: "playback", "driver stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        let tick = editor.lock().advance(period);
                        on_tick(tick);
                        if !tick.playing {
                            tracing::debug!(target: "playback", "playback ended at {:.2}s", tick.position);
                            break;
                        }
                    }
                }
            }
        });
        Self {
            stop_tx: Some(stop_tx),
            handle,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancels the timer and waits for the task to exit.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.handle).await;
    }

    /// Waits for playback to end without cancelling it.
    pub async fn join(mut self) {
        let _ = (&mut self.handle).await;
    }
}

impl Drop for PlaybackDriver {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

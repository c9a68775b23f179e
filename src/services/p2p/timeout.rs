use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use super::{Event, EventSink};

/// Default time a connection attempt may take before it is abandoned.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(100);

/// Single-shot timer guarding an in-flight connection attempt.
///
/// Expiry is delivered as [`Event::ConnectTimeout`] through the session's
/// event channel, tagged with the generation the timer was armed with. The
/// session hands the event back to [`ConnectTimeout::fire`], which rejects
/// firings from timers that were cancelled or re-armed in the meantime.
#[derive(Debug)]
pub struct ConnectTimeout {
    duration: Duration,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl ConnectTimeout {
    /// Create a disarmed timer.
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            generation: 0,
            task: None,
        }
    }

    /// Configured timeout.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Whether a timer is pending.
    pub fn is_armed(&self) -> bool {
        self.task.is_some()
    }

    /// Generation of the most recently armed timer.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Arm the timer, replacing any pending one. Must run inside a tokio
    /// runtime.
    pub fn arm(&mut self, sink: &EventSink) -> u64 {
        self.cancel();

        self.generation += 1;
        let generation = self.generation;
        let duration = self.duration;
        let sink = sink.clone();

        debug!("Arming connect timeout of {duration:?} (generation {generation})");

        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            sink.emit(Event::ConnectTimeout { generation });
        }));

        generation
    }

    /// Cancel a pending timer. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                debug!("Cancelled connect timeout (generation {})", self.generation);
                true
            }
            None => false,
        }
    }

    /// Accept an expiry event.
    ///
    /// Returns `true` only for the currently armed generation; the timer is
    /// disarmed afterwards.
    pub fn fire(&mut self, generation: u64) -> bool {
        if self.task.is_none() || generation != self.generation {
            return false;
        }

        self.task = None;
        true
    }
}

impl Default for ConnectTimeout {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl Drop for ConnectTimeout {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

//! Stage timing.

use std::time::Duration;
use tokio::time::Instant;

use crate::utils::round_tenths;

/// Measures how long a stage has been active.
///
/// Uses the tokio clock, so paused-time tests see virtual durations.
#[derive(Debug)]
pub struct StageTimer {
    start: Instant,
    stage_id: String,
}

impl StageTimer {
    /// Starts a new timer.
    #[must_use]
    pub fn start(stage_id: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            stage_id: stage_id.into(),
        }
    }

    /// Returns the elapsed time.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Returns the stage id.
    #[must_use]
    pub fn stage_id(&self) -> &str {
        &self.stage_id
    }

    /// Stops the timer and returns the elapsed seconds rounded to tenths.
    #[must_use]
    pub fn finish(self) -> f64 {
        round_tenths(self.elapsed().as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_uses_tokio_clock() {
        let timer = StageTimer::start("crawl");
        tokio::time::advance(Duration::from_millis(1_240)).await;

        assert_eq!(timer.stage_id(), "crawl");
        assert!((timer.finish() - 1.2).abs() < f64::EPSILON);
    }
}

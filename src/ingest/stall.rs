//! Decode progress deadline.
//!
//! A source is stalled when no frame has been decoded for `timeout`. Skipped
//! (off-stride) frames count as progress, so a long sampling stride never
//! trips the deadline on its own.

use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug)]
pub(crate) struct StallWatch {
    timeout: Duration,
    last_progress: Instant,
}

impl StallWatch {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self::started_at(timeout, Instant::now())
    }

    fn started_at(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            last_progress: now,
        }
    }

    /// Record that the decoder made progress.
    pub(crate) fn progress(&mut self) {
        self.progress_at(Instant::now());
    }

    fn progress_at(&mut self, now: Instant) {
        self.last_progress = now;
    }

    pub(crate) fn is_stalled(&self) -> bool {
        self.is_stalled_at(Instant::now())
    }

    fn is_stalled_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_progress) > self.timeout
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(30);

    #[test]
    fn steady_progress_never_stalls() {
        let start = Instant::now();
        let mut watch = StallWatch::started_at(TIMEOUT, start);
        // A long stride: 95 s of decoding before the next sampled frame, but
        // a frame decodes every 5 s.
        for step in 1..=19 {
            let now = start + Duration::from_secs(5 * step);
            assert!(!watch.is_stalled_at(now));
            watch.progress_at(now);
        }
        assert!(!watch.is_stalled_at(start + Duration::from_secs(120)));
    }

    #[test]
    fn stalls_once_progress_stops() {
        let start = Instant::now();
        let mut watch = StallWatch::started_at(TIMEOUT, start);
        watch.progress_at(start + Duration::from_secs(10));
        assert!(!watch.is_stalled_at(start + Duration::from_secs(40)));
        assert!(watch.is_stalled_at(start + Duration::from_secs(41)));
    }

    #[test]
    fn fresh_watch_is_not_stalled() {
        let watch = StallWatch::new(TIMEOUT);
        assert!(!watch.is_stalled());
        assert_eq!(watch.timeout(), TIMEOUT);
    }
}

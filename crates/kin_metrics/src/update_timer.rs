//! Timing of whole engine updates

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Rolling statistics over the last `window` engine updates.
#[derive(Debug)]
pub struct UpdateTimer {
    started: Option<Instant>,
    window: usize,
    durations: VecDeque<Duration>,
}

impl UpdateTimer {
    /// A zero window still keeps the latest sample.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            started: None,
            window,
            durations: VecDeque::with_capacity(window),
        }
    }

    pub fn begin(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Records the time since the matching `begin`. Unpaired calls are ignored.
    pub fn end(&mut self) {
        if let Some(started) = self.started.take() {
            self.record(started.elapsed());
        }
    }

    fn record(&mut self, elapsed: Duration) {
        if self.durations.len() == self.window {
            self.durations.pop_front();
        }
        self.durations.push_back(elapsed);
    }

    pub fn samples(&self) -> usize {
        self.durations.len()
    }

    fn average(&self) -> Duration {
        if self.durations.is_empty() {
            return Duration::ZERO;
        }
        let sum: Duration = self.durations.iter().sum();
        sum / self.durations.len() as u32
    }

    pub fn average_ms(&self) -> f64 {
        self.average().as_secs_f64() * 1000.0
    }

    pub fn range_ms(&self) -> (f64, f64) {
        let min = self.durations.iter().min().copied().unwrap_or_default();
        let max = self.durations.iter().max().copied().unwrap_or_default();
        (min.as_secs_f64() * 1000.0, max.as_secs_f64() * 1000.0)
    }

    pub fn updates_per_second(&self) -> f64 {
        let avg = self.average().as_secs_f64();
        if avg > 0.0 {
            1.0 / avg
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
    }

    #[test]
    fn test_unpaired_end_is_ignored() {
        let mut timer = UpdateTimer::new(4);
        timer.end();
        assert_eq!(timer.samples(), 0);

        timer.begin();
        timer.end();
        timer.end();
        assert_eq!(timer.samples(), 1);
        let (min, max) = timer.range_ms();
        assert!(min <= max);
    }

    #[test]
    fn test_window_drops_oldest() {
        let mut timer = UpdateTimer::new(3);
        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(20));
        assert_close(timer.average_ms(), 15.0);

        timer.record(Duration::from_millis(30));
        timer.record(Duration::from_millis(40));
        assert_eq!(timer.samples(), 3);
        assert_close(timer.average_ms(), 30.0);
        let (min, max) = timer.range_ms();
        assert_close(min, 20.0);
        assert_close(max, 40.0);
        assert_close(timer.updates_per_second(), 1000.0 / 30.0);
    }

    #[test]
    fn test_zero_window_keeps_latest() {
        let mut timer = UpdateTimer::new(0);
        timer.record(Duration::from_millis(1));
        timer.record(Duration::from_millis(2));
        assert_eq!(timer.samples(), 1);
        assert_close(timer.average_ms(), 2.0);
    }
}

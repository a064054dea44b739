//! Wall-time accounting per engine service

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct ServiceProfiler {
    totals: HashMap<String, Duration>,
}

impl ServiceProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time<F, R>(&mut self, name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.record(name, start.elapsed());
        result
    }

    /// Adds an externally measured duration to `name`'s total.
    pub fn record(&mut self, name: &str, elapsed: Duration) {
        match self.totals.get_mut(name) {
            Some(total) => *total += elapsed,
            None => {
                self.totals.insert(name.to_owned(), elapsed);
            }
        }
    }

    pub fn total(&self, name: &str) -> Duration {
        self.totals.get(name).copied().unwrap_or(Duration::ZERO)
    }

    pub fn reset(&mut self) {
        self.totals.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Duration)> {
        self.totals.iter().map(|(name, total)| (name.as_str(), *total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates() {
        let mut profiler = ServiceProfiler::new();
        profiler.record("gravity", Duration::from_micros(5));
        profiler.record("gravity", Duration::from_micros(7));
        assert_eq!(profiler.total("gravity"), Duration::from_micros(12));
        assert_eq!(profiler.total("other"), Duration::ZERO);

        let out = profiler.time("other", || 1 + 1);
        assert_eq!(out, 2);
        assert_eq!(profiler.iter().count(), 2);

        profiler.reset();
        assert_eq!(profiler.iter().count(), 0);
    }
}

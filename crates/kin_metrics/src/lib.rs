//! Kin Metrics - instrumentation for the entity engine
//!
//! Tracks update timings, per-service wall time and named event counters.
//! Everything compiles down to zero-sized no-ops unless the `metrics`
//! feature is enabled.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable metrics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use kin_metrics::{Counter, UpdateTimer};
//!
//! let mut timer = UpdateTimer::new(120);
//! timer.begin();
//! // ... engine.update() ...
//! timer.end();
//! println!("update: {:.3} ms", timer.average_ms());
//! ```

#[cfg(feature = "metrics")]
mod counter;
#[cfg(feature = "metrics")]
mod service_profiler;
#[cfg(feature = "metrics")]
mod update_timer;

#[cfg(feature = "metrics")]
pub use counter::Counter;
#[cfg(feature = "metrics")]
pub use service_profiler::ServiceProfiler;
#[cfg(feature = "metrics")]
pub use update_timer::UpdateTimer;

/// Whether instrumentation is compiled in.
pub const ENABLED: bool = cfg!(feature = "metrics");

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default)]
pub struct UpdateTimer;

#[cfg(not(feature = "metrics"))]
impl UpdateTimer {
    pub fn new(_window: usize) -> Self { Self }
    pub fn begin(&mut self) {}
    pub fn end(&mut self) {}
    pub fn samples(&self) -> usize { 0 }
    pub fn average_ms(&self) -> f64 { 0.0 }
    pub fn range_ms(&self) -> (f64, f64) { (0.0, 0.0) }
    pub fn updates_per_second(&self) -> f64 { 0.0 }
}

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default)]
pub struct Counter;

#[cfg(not(feature = "metrics"))]
impl Counter {
    pub fn new() -> Self { Self }
    pub fn add(&mut self, _name: &'static str, _value: u64) {}
    pub fn get(&self, _name: &str) -> u64 { 0 }
    pub fn reset_all(&mut self) {}
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> { std::iter::empty() }
}

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default)]
pub struct ServiceProfiler;

#[cfg(not(feature = "metrics"))]
impl ServiceProfiler {
    pub fn new() -> Self { Self }
    pub fn time<F, R>(&mut self, _name: &str, f: F) -> R where F: FnOnce() -> R { f() }
    pub fn record(&mut self, _name: &str, _elapsed: std::time::Duration) {}
    pub fn total(&self, _name: &str) -> std::time::Duration { std::time::Duration::ZERO }
    pub fn reset(&mut self) {}
    pub fn iter(&self) -> impl Iterator<Item = (&str, std::time::Duration)> { std::iter::empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_available_in_every_build() {
        let mut timer = UpdateTimer::new(8);
        timer.begin();
        timer.end();
        let mut counter = Counter::new();
        counter.add("flush.passes", 1);
        let mut profiler = ServiceProfiler::new();
        let value = profiler.time("noop", || 7);
        assert_eq!(value, 7);
        if ENABLED {
            assert_eq!(counter.get("flush.passes"), 1);
            assert_eq!(timer.samples(), 1);
        } else {
            assert_eq!(counter.get("flush.passes"), 0);
        }
    }
}

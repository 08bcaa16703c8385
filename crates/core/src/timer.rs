//! Frame timing.

use std::time::{Duration, Instant};

/// Longest frame delta handed to simulation code. Keeps the scene from
/// jumping after a long stall (window drag, debugger break).
const MAX_DELTA: Duration = Duration::from_millis(250);

/// High-resolution timer for frame delta measurement.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
        }
    }

    /// Total elapsed time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time elapsed since the last call to `tick()`, clamped to a sane
    /// maximum.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = (now - self.last_tick).min(MAX_DELTA);
        self.last_tick = now;
        delta
    }

    /// Delta time in seconds since the last tick.
    pub fn delta_secs(&mut self) -> f32 {
        self.tick().as_secs_f32()
    }

    /// Reset the timer to the current time.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_tick = now;
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_is_monotonic_and_clamped() {
        let mut timer = Timer::new();
        let delta = timer.tick();
        assert!(delta <= MAX_DELTA);
        assert!(timer.elapsed() >= delta);
    }

    #[test]
    fn test_reset_restarts_elapsed() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(5));
        timer.reset();
        assert!(timer.elapsed() < Duration::from_millis(5));
    }
}

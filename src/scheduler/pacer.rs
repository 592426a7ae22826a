// src/scheduler/pacer.rs
//! Frame pacing with a carried timing surplus.
//!
//! A frame may be painted once the time since it started reaches the target
//! frame time, less whatever the previous frames ran over. Overruns and
//! underruns are carried forward instead of being reset every frame, so the
//! long-run average rate stays on target.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Pacer {
    /// `None` paints as soon as a frame is ready.
    frame_time: Option<Duration>,
    frame_start: Instant,
    /// Milliseconds previous frames ran over the target (negative when early).
    carry_ms: f64,
}

impl Pacer {
    pub fn new(fps: u32, now: Instant) -> Self {
        let frame_time = (fps > 0).then(|| Duration::from_secs_f64(1.0 / fps as f64));
        Self {
            frame_time,
            frame_start: now,
            carry_ms: 0.0,
        }
    }

    pub fn frame_time(&self) -> Option<Duration> {
        self.frame_time
    }

    pub fn carry_ms(&self) -> f64 {
        self.carry_ms
    }

    fn elapsed_ms(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.frame_start).as_secs_f64() * 1000.0
    }

    /// Whether the current frame's budget has been used up.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.frame_time {
            None => true,
            Some(target) => self.elapsed_ms(now) >= target.as_secs_f64() * 1000.0 - self.carry_ms,
        }
    }

    /// Time left until the current frame is due, if any.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let target = self.frame_time?;
        let left = target.as_secs_f64() * 1000.0 - self.carry_ms - self.elapsed_ms(now);
        (left > 0.0).then(|| Duration::from_secs_f64(left / 1000.0))
    }

    /// Record that a frame was painted at `now` and start timing the next one.
    pub fn frame_painted(&mut self, now: Instant) {
        if let Some(target) = self.frame_time {
            let elapsed = self.elapsed_ms(now);
            self.carry_ms += elapsed - target.as_secs_f64() * 1000.0;
        }
        self.frame_start = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test_log::test]
    fn unpaced_is_always_due() {
        let start = Instant::now();
        let pacer = Pacer::new(0, start);
        assert!(pacer.is_due(start));
        assert_eq!(pacer.remaining(start), None);
    }

    #[test_log::test]
    fn defers_until_frame_time_elapses() {
        let start = Instant::now();
        let pacer = Pacer::new(10, start);
        assert!(!pacer.is_due(start + ms(50)));
        assert!(pacer.remaining(start + ms(50)).is_some());
        assert!(pacer.is_due(start + ms(100)));
        assert!(pacer.is_due(start + ms(250)));
    }

    #[test_log::test]
    fn overrun_shortens_the_next_frame() {
        let start = Instant::now();
        let mut pacer = Pacer::new(10, start);
        // First frame takes 150 ms against a 100 ms budget.
        pacer.frame_painted(start + ms(150));
        assert!((pacer.carry_ms() - 50.0).abs() < 1e-6);
        let second = start + ms(150);
        assert!(!pacer.is_due(second + ms(40)));
        assert!(pacer.is_due(second + ms(50)));
    }

    #[test_log::test]
    fn carry_keeps_the_average_rate() {
        let start = Instant::now();
        let mut pacer = Pacer::new(10, start);
        let mut now = start;
        // Alternate slow and quick frames; always paint the moment it is due or later.
        for slow in [true, false, true, false] {
            let step = if slow { ms(130) } else { ms(1) };
            now += step;
            while !pacer.is_due(now) {
                now += ms(1);
            }
            pacer.frame_painted(now);
        }
        let total = now.duration_since(start).as_millis();
        assert!((399..=401).contains(&total), "four frames took {total} ms");
    }
}

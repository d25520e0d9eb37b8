use std::time::{Duration, Instant};

/// Snapshot of the clock handed to the kernel for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Seconds since the session started.
    pub seconds: f32,
    /// Monotonic frame counter for the running session.
    pub frame_index: u64,
}

impl TimeSample {
    pub fn new(seconds: f32, frame_index: u64) -> Self {
        Self {
            seconds,
            frame_index,
        }
    }
}

/// Abstraction over where frame times come from.
pub trait TimeSource: Send {
    /// Resets the source to its initial state.
    fn reset(&mut self);
    /// Produces a time sample for the next frame.
    fn sample(&mut self) -> TimeSample;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
    frame: u64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            frame: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.origin = Instant::now();
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.origin.elapsed().as_secs_f32(), self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Advances by a fixed step per frame, so offscreen renders are repeatable.
#[derive(Debug, Clone, Copy)]
pub struct SteppedTimeSource {
    step: f32,
    frame: u64,
}

impl SteppedTimeSource {
    pub fn new(step: f32) -> Self {
        Self { step, frame: 0 }
    }

    /// Steps at the rate of `fps` frames per second; non-positive rates fall
    /// back to 60.
    pub fn at_fps(fps: f32) -> Self {
        let fps = if fps > 0.0 { fps } else { 60.0 };
        Self::new(1.0 / fps)
    }
}

impl TimeSource for SteppedTimeSource {
    fn reset(&mut self) {
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.frame as f32 * self.step, self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

pub type BoxedTimeSource = Box<dyn TimeSource + Send>;

/// Throttles redraws to an optional target frame rate.
#[derive(Debug, Clone)]
pub struct FramePacer {
    target_interval: Option<Duration>,
    accumulator: Duration,
    last_tick: Option<Instant>,
}

impl FramePacer {
    /// `None` or a non-positive rate disables pacing.
    pub fn new(target_fps: Option<f32>) -> Self {
        let target_interval = target_fps.and_then(|fps| {
            if fps > 0.0 && fps.is_finite() {
                Some(Duration::from_secs_f32(1.0 / fps))
            } else {
                None
            }
        });
        Self {
            target_interval,
            accumulator: Duration::ZERO,
            last_tick: None,
        }
    }

    pub fn target_interval(&self) -> Option<Duration> {
        self.target_interval
    }

    pub fn reset(&mut self, now: Instant) {
        self.accumulator = Duration::ZERO;
        self.last_tick = Some(now);
    }

    /// Whether a frame is due at `now`. Late frames carry their lateness
    /// into the next interval.
    pub fn should_render(&mut self, now: Instant) -> bool {
        let last = self.last_tick.replace(now);
        let (Some(interval), Some(last)) = (self.target_interval, last) else {
            return true;
        };
        self.accumulator = self
            .accumulator
            .saturating_add(now.saturating_duration_since(last));
        if self.accumulator + Duration::from_micros(250) < interval {
            false
        } else {
            self.accumulator = self.accumulator.saturating_sub(interval).min(interval);
            true
        }
    }

    /// When the next frame becomes due, if pacing is enabled.
    pub fn next_deadline(&self) -> Option<Instant> {
        let interval = self.target_interval?;
        let last = self.last_tick?;
        Some(last + interval.saturating_sub(self.accumulator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stepped_source_is_repeatable() {
        let mut source = SteppedTimeSource::new(0.5);
        let first: Vec<_> = (0..3).map(|_| source.sample()).collect();
        assert_eq!(first[2], TimeSample::new(1.0, 2));
        source.reset();
        assert_eq!(source.sample(), TimeSample::new(0.0, 0));
    }

    #[test]
    fn system_source_counts_frames() {
        let mut source = SystemTimeSource::new();
        assert_eq!(source.sample().frame_index, 0);
        let second = source.sample();
        assert_eq!(second.frame_index, 1);
        assert!(second.seconds >= 0.0);
    }

    #[test]
    fn unpaced_always_renders() {
        let mut pacer = FramePacer::new(None);
        let now = Instant::now();
        assert!(pacer.should_render(now));
        assert!(pacer.should_render(now));
        assert_eq!(pacer.next_deadline(), None);
        assert_eq!(FramePacer::new(Some(0.0)).target_interval(), None);
    }

    #[test]
    fn paced_waits_for_the_interval() {
        let mut pacer = FramePacer::new(Some(10.0));
        let start = Instant::now();
        assert!(pacer.should_render(start));
        assert!(!pacer.should_render(start + Duration::from_millis(40)));
        assert!(pacer.should_render(start + Duration::from_millis(100)));
        let deadline = pacer.next_deadline().unwrap();
        assert!(deadline > start + Duration::from_millis(100));
    }
}

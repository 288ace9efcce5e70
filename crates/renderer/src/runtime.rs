use std::time::{Duration, Instant};

/// Snapshot of the clock supplied to the program inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Elapsed wall-clock or simulated time in seconds.
    pub seconds: f32,
    /// Monotonic frame counter for the running session.
    pub frame_index: u64,
}

impl TimeSample {
    /// Creates a new time sample.
    pub fn new(seconds: f32, frame_index: u64) -> Self {
        Self {
            seconds,
            frame_index,
        }
    }
}

/// Abstraction over where time values originate from.
///
/// Successive samples after a reset never decrease.
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
    /// Creates a system time source initialised to `Instant::now()`.
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
        let elapsed = self.origin.elapsed();
        let sample = TimeSample::new(elapsed.as_secs_f32(), self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Time source that always reports a fixed timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    time: f32,
    frame: u64,
}

impl FixedTimeSource {
    /// Constructs a fixed time source; negative or non-finite times read as zero.
    pub fn new(time: f32) -> Self {
        let time = if time.is_finite() { time.max(0.0) } else { 0.0 };
        Self { time, frame: 0 }
    }

    /// Accesses the fixed timestamp without advancing the frame counter.
    pub fn time(&self) -> f32 {
        self.time
    }
}

impl TimeSource for FixedTimeSource {
    fn reset(&mut self) {
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.time, self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Simulated clock advancing by a fixed step per frame, starting at zero.
#[derive(Debug, Clone, Copy)]
pub struct SteppedTimeSource {
    step: f32,
    frame: u64,
}

impl SteppedTimeSource {
    pub fn new(step: Duration) -> Self {
        Self {
            step: step.as_secs_f32(),
            frame: 0,
        }
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

/// Convenient alias for owning time sources behind trait objects.
pub type BoxedTimeSource = Box<dyn TimeSource + Send>;

/// Wall clock, or a frozen clock when `fixed` is set.
pub fn time_source(fixed: Option<f32>) -> BoxedTimeSource {
    match fixed {
        Some(time) => Box::new(FixedTimeSource::new(time)),
        None => Box::new(SystemTimeSource::new()),
    }
}

/// Spacing between frames for an FPS cap.
///
/// `None` for caps that are non-finite, non-positive or too small for the
/// interval to be representable.
pub fn frame_interval(target_fps: Option<f32>) -> Option<Duration> {
    target_fps
        .filter(|fps| fps.is_finite() && *fps > 0.0)
        .and_then(|fps| Duration::try_from_secs_f32(1.0 / fps).ok())
}

/// Decides when the next frame is due.
///
/// With an FPS cap, frames are spaced by the cap's interval; otherwise the
/// loop only yields for the idle pause between frames.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    interval: Option<Duration>,
    idle: Duration,
    last: Option<Instant>,
}

impl FrameScheduler {
    pub fn new(target_fps: Option<f32>, idle: Duration) -> Self {
        Self {
            interval: frame_interval(target_fps),
            idle,
            last: None,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    fn spacing(&self) -> Duration {
        self.interval.unwrap_or(self.idle)
    }

    /// Deadline for the next frame, `None` before the first one.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.last.map(|last| last + self.spacing())
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        self.next_deadline().map_or(true, |deadline| now >= deadline)
    }

    pub fn mark_rendered(&mut self, now: Instant) {
        self.last = Some(now);
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Blocks until the next frame is due.
    pub fn pace(&self) {
        if let Some(deadline) = self.next_deadline() {
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_time_is_non_decreasing() {
        let mut clock = SystemTimeSource::new();
        clock.reset();
        let mut previous = clock.sample();
        assert!(previous.seconds >= 0.0);
        for _ in 0..100 {
            let next = clock.sample();
            assert!(next.seconds >= previous.seconds);
            assert_eq!(next.frame_index, previous.frame_index + 1);
            previous = next;
        }
    }

    #[test]
    fn fixed_time_clamps_negative_values() {
        let mut clock = FixedTimeSource::new(-3.0);
        assert_eq!(clock.sample().seconds, 0.0);
        assert_eq!(FixedTimeSource::new(f32::NAN).time(), 0.0);
    }

    #[test]
    fn stepped_time_advances_per_frame() {
        let mut clock = SteppedTimeSource::new(Duration::from_millis(250));
        let times: Vec<f32> = (0..4).map(|_| clock.sample().seconds).collect();
        assert_eq!(times, vec![0.0, 0.25, 0.5, 0.75]);
        clock.reset();
        assert_eq!(clock.sample().seconds, 0.0);
    }

    #[test]
    fn scheduler_spaces_frames_by_fps_cap() {
        let mut scheduler = FrameScheduler::new(Some(64.0), Duration::from_millis(1));
        let start = Instant::now();
        assert!(scheduler.ready_for_frame(start));
        scheduler.mark_rendered(start);
        assert!(!scheduler.ready_for_frame(start + Duration::from_millis(10)));
        assert!(scheduler.ready_for_frame(start + Duration::from_millis(16)));
        assert_eq!(scheduler.next_deadline(), Some(start + Duration::from_micros(15_625)));
    }

    #[test]
    fn scheduler_without_cap_uses_idle_pause() {
        let mut scheduler = FrameScheduler::new(None, Duration::from_millis(1));
        assert_eq!(scheduler.interval(), None);
        let start = Instant::now();
        scheduler.mark_rendered(start);
        assert_eq!(scheduler.next_deadline(), Some(start + Duration::from_millis(1)));
        scheduler.reset();
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn scheduler_ignores_unusable_caps() {
        assert_eq!(FrameScheduler::new(Some(0.0), Duration::ZERO).interval(), None);
        assert_eq!(FrameScheduler::new(Some(f32::INFINITY), Duration::ZERO).interval(), None);
        assert_eq!(FrameScheduler::new(Some(f32::NAN), Duration::ZERO).interval(), None);
    }

    #[test]
    fn scheduler_treats_unrepresentable_interval_as_uncapped() {
        let scheduler = FrameScheduler::new(Some(1e-20), Duration::from_millis(1));
        assert_eq!(scheduler.interval(), None);
        assert_eq!(frame_interval(Some(f32::MIN_POSITIVE)), None);
        assert_eq!(frame_interval(Some(0.5)), Some(Duration::from_secs(2)));
    }
}

use std::time::{Duration, Instant};

/// Abstraction over where frame timestamps originate from.
pub trait TimeSource {
    /// Timestamp for the next frame.
    fn now(&mut self) -> Instant;
    /// Timestamp the source started from.
    fn origin(&self) -> Instant;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
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
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&mut self) -> Instant {
        Instant::now()
    }

    fn origin(&self) -> Instant {
        self.origin
    }
}

/// Time source that advances by a fixed step on every sample.
///
/// Used for headless rendering so output does not depend on host speed.
/// Once the clock can no longer be represented it stops advancing.
#[derive(Debug, Clone, Copy)]
pub struct SteppedTimeSource {
    origin: Instant,
    current: Instant,
    step: Duration,
}

impl SteppedTimeSource {
    pub fn new(step: Duration) -> Self {
        let origin = Instant::now();
        Self {
            origin,
            current: origin,
            step,
        }
    }
}

impl TimeSource for SteppedTimeSource {
    fn now(&mut self) -> Instant {
        if let Some(next) = self.current.checked_add(self.step) {
            self.current = next;
        }
        self.current
    }

    fn origin(&self) -> Instant {
        self.origin
    }
}

/// Caps the presentation rate when a target FPS is requested.
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
    interval: Option<Duration>,
    next: Option<Instant>,
}

impl FramePacer {
    /// Non-positive, missing or unrepresentably slow targets disable pacing.
    pub fn new(target_fps: Option<f32>) -> Self {
        let interval = target_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .and_then(|fps| Duration::try_from_secs_f32(1.0 / fps).ok());
        if target_fps.is_some_and(|fps| fps > 0.0) && interval.is_none() {
            tracing::warn!(fps = ?target_fps, "frame rate cap out of range; rendering uncapped");
        }
        Self {
            interval,
            next: None,
        }
    }

    /// Returns true when a frame may be produced at `now`.
    pub fn ready(&self, now: Instant) -> bool {
        self.next.map_or(true, |deadline| now >= deadline)
    }

    /// When the next frame is due, if pacing is active.
    pub fn deadline(&self) -> Option<Instant> {
        self.next
    }

    /// Records a produced frame and returns when the next one is due.
    pub fn mark(&mut self, now: Instant) -> Option<Instant> {
        let interval = self.interval?;
        self.next = self
            .next
            .unwrap_or(now)
            .checked_add(interval)
            .filter(|next| *next >= now)
            .or_else(|| now.checked_add(interval));
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stepped_source_advances_uniformly() {
        let mut source = SteppedTimeSource::new(Duration::from_millis(10));
        let origin = source.origin();
        assert_eq!(source.now() - origin, Duration::from_millis(10));
        assert_eq!(source.now() - origin, Duration::from_millis(20));
    }

    #[test]
    fn stepped_source_stops_at_the_end_of_representable_time() {
        let mut source = SteppedTimeSource::new(Duration::MAX);
        let origin = source.origin();
        assert_eq!(source.now(), origin);
        assert_eq!(source.now(), origin);
    }

    #[test]
    fn unlimited_pacer_is_always_ready() {
        let mut pacer = FramePacer::new(None);
        let now = Instant::now();
        assert!(pacer.mark(now).is_none());
        assert!(pacer.ready(now));
        assert!(FramePacer::new(Some(0.0)).mark(now).is_none());
    }

    #[test]
    fn vanishing_frame_rate_disables_pacing() {
        let now = Instant::now();
        let mut pacer = FramePacer::new(Some(1e-30));
        assert!(pacer.mark(now).is_none());
        assert!(pacer.ready(now + Duration::from_millis(1)));
    }

    #[test]
    fn limited_pacer_waits_for_interval() {
        let mut pacer = FramePacer::new(Some(50.0));
        let start = Instant::now();
        assert!(pacer.ready(start));
        let next = pacer.mark(start).unwrap();
        assert_eq!(next - start, Duration::from_millis(20));
        assert_eq!(pacer.deadline(), Some(next));
        assert!(!pacer.ready(start + Duration::from_millis(5)));
        assert!(pacer.ready(start + Duration::from_millis(20)));
    }

    #[test]
    fn late_frames_do_not_accumulate_debt() {
        let mut pacer = FramePacer::new(Some(100.0));
        let start = Instant::now();
        pacer.mark(start);
        let late = start + Duration::from_millis(500);
        let next = pacer.mark(late).unwrap();
        assert_eq!(next - late, Duration::from_millis(10));
    }
}

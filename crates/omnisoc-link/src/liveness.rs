use std::time::{Duration, Instant};

/// Tracks how recently a valid frame was decoded.
///
/// A new tracker starts timed out: the link is not considered live until the
/// first good frame arrives. Only a successful decode clears the flag.
/// Setting it again is the caller's decision, through
/// [`expire_if_stale`](LivenessTracker::expire_if_stale).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessTracker {
    last_live_at: Instant,
    timed_out: bool,
}

impl LivenessTracker {
    /// A timed-out tracker stamped with the current time.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// A timed-out tracker stamped with `now`.
    pub fn starting_at(now: Instant) -> Self {
        Self {
            last_live_at: now,
            timed_out: true,
        }
    }

    /// Record a successful decode at the current time.
    pub fn on_frame_decoded(&mut self) {
        self.on_frame_decoded_at(Instant::now());
    }

    /// Record a successful decode at `now`.
    pub fn on_frame_decoded_at(&mut self, now: Instant) {
        self.last_live_at = now;
        self.timed_out = false;
    }

    /// Whether a frame has been decoded and the last one is younger than
    /// `period`.
    pub fn is_live(&self, now: Instant, period: Duration) -> bool {
        !self.timed_out && self.since_last_live(now) < period
    }

    /// When the last good frame was decoded (or the tracker was created).
    pub fn last_live_at(&self) -> Instant {
        self.last_live_at
    }

    /// The raw timed-out flag.
    pub fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    /// Time since [`last_live_at`](Self::last_live_at); zero if `now` is
    /// earlier.
    pub fn since_last_live(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_live_at)
    }

    /// Set the timed-out flag if no frame arrived within `period`.
    ///
    /// Returns `true` only when this call changed the flag.
    pub fn expire_if_stale(&mut self, now: Instant, period: Duration) -> bool {
        if self.timed_out || self.since_last_live(now) < period {
            return false;
        }
        self.timed_out = true;
        true
    }
}

impl Default for LivenessTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_millis(1000);

    #[test]
    fn starts_timed_out() {
        let t0 = Instant::now();
        let tracker = LivenessTracker::starting_at(t0);
        assert!(tracker.is_timed_out());
        assert_eq!(tracker.last_live_at(), t0);
        assert!(!tracker.is_live(t0, PERIOD));
    }

    #[test]
    fn decode_makes_live_within_period() {
        let t0 = Instant::now();
        let mut tracker = LivenessTracker::starting_at(t0);

        tracker.on_frame_decoded_at(t0 + Duration::from_millis(10));
        assert!(!tracker.is_timed_out());
        assert!(tracker.is_live(t0 + Duration::from_millis(500), PERIOD));
        assert!(tracker.is_live(t0 + Duration::from_millis(1009), PERIOD));
        assert!(!tracker.is_live(t0 + Duration::from_millis(1010), PERIOD));
    }

    #[test]
    fn stale_link_is_not_live_even_before_expiry() {
        let t0 = Instant::now();
        let mut tracker = LivenessTracker::starting_at(t0);
        tracker.on_frame_decoded_at(t0);

        let later = t0 + Duration::from_secs(5);
        assert!(!tracker.is_timed_out());
        assert!(!tracker.is_live(later, PERIOD));
        assert_eq!(tracker.since_last_live(later), Duration::from_secs(5));
    }

    #[test]
    fn expire_if_stale_reports_transition_once() {
        let t0 = Instant::now();
        let mut tracker = LivenessTracker::starting_at(t0);
        tracker.on_frame_decoded_at(t0);

        assert!(!tracker.expire_if_stale(t0 + Duration::from_millis(999), PERIOD));
        assert!(!tracker.is_timed_out());

        assert!(tracker.expire_if_stale(t0 + PERIOD, PERIOD));
        assert!(tracker.is_timed_out());
        assert!(!tracker.expire_if_stale(t0 + Duration::from_secs(3), PERIOD));
    }

    #[test]
    fn decode_after_expiry_restores() {
        let t0 = Instant::now();
        let mut tracker = LivenessTracker::starting_at(t0);
        tracker.on_frame_decoded_at(t0);
        assert!(tracker.expire_if_stale(t0 + Duration::from_secs(2), PERIOD));

        let t1 = t0 + Duration::from_secs(3);
        tracker.on_frame_decoded_at(t1);
        assert!(tracker.is_live(t1, PERIOD));
        assert_eq!(tracker.last_live_at(), t1);
    }

    #[test]
    fn since_last_live_saturates() {
        let t0 = Instant::now();
        let tracker = LivenessTracker::starting_at(t0 + Duration::from_secs(1));
        assert_eq!(tracker.since_last_live(t0), Duration::ZERO);
    }

    #[test]
    fn default_is_timed_out() {
        assert!(LivenessTracker::default().is_timed_out());
    }
}

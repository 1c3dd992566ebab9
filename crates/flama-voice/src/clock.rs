/// Output audio clock guaranteeing chunks play back-to-back, never
/// overlapping and never reordered.
///
/// Each chunk starts at `max(previous scheduled end, current clock time)`
/// and its end advances the clock.
#[derive(Debug, Default)]
pub struct PlaybackClock {
    next_start: f64,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a chunk of the given duration at clock time `now`,
    /// returning the chunk's start time.
    pub fn schedule(&mut self, now: f64, duration: f64) -> f64 {
        let start = self.next_start.max(now);
        self.next_start = start + duration;
        start
    }

    /// End of the last scheduled chunk.
    pub fn next_start(&self) -> f64 {
        self.next_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_chunks_play_back_to_back() {
        let mut clock = PlaybackClock::new();
        // Two chunks arrive at t=0 faster than they play.
        assert_eq!(clock.schedule(0.0, 0.5), 0.0);
        assert_eq!(clock.schedule(0.0, 0.5), 0.5);
        assert_eq!(clock.schedule(0.0, 0.25), 1.0);
    }

    #[test]
    fn gap_after_silence_starts_at_now() {
        let mut clock = PlaybackClock::new();
        clock.schedule(0.0, 0.5);
        // Next chunk arrives after the previous one finished playing.
        assert_eq!(clock.schedule(2.0, 0.5), 2.0);
        assert_eq!(clock.next_start(), 2.5);
    }

    #[test]
    fn never_schedules_before_previous_end() {
        let mut clock = PlaybackClock::new();
        let mut last_end = 0.0;
        for (now, dur) in [(0.0, 0.3), (0.1, 0.3), (0.2, 0.1), (5.0, 0.2)] {
            let start = clock.schedule(now, dur);
            assert!(start >= last_end);
            last_end = start + dur;
        }
    }
}

use std::time::Duration;

/// A single-shot countdown with explicit arm/cancel semantics.
///
/// The segmenter (silence debounce) and the recognition controller (restart
/// backoff) each own independent instances. Deadlines are plain millisecond
/// values supplied by the caller's clock — frame timestamps on the audio
/// path, elapsed runtime on the controller path — so the same type serves
/// both without touching wall time.
#[derive(Debug, Clone)]
pub struct Countdown {
    delay_ms: u64,
    deadline_ms: Option<u64>,
}

impl Countdown {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            deadline_ms: None,
        }
    }

    /// Arm the countdown at `now_ms`. Any pending deadline is replaced.
    pub fn arm(&mut self, now_ms: u64) {
        self.deadline_ms = Some(now_ms + self.delay_ms);
    }

    /// Arm only if no deadline is pending.
    pub fn arm_if_idle(&mut self, now_ms: u64) {
        if self.deadline_ms.is_none() {
            self.arm(now_ms);
        }
    }

    /// Arm with a delay different from the configured one (retry backoff).
    pub fn arm_with(&mut self, now_ms: u64, delay_ms: u64) {
        self.deadline_ms = Some(now_ms + delay_ms);
    }

    pub fn cancel(&mut self) {
        self.deadline_ms = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline_ms.is_some()
    }

    /// The pending deadline, if armed.
    pub fn deadline(&self) -> Option<u64> {
        self.deadline_ms
    }

    /// Whether an armed deadline has passed as of `now_ms`.
    pub fn expired(&self, now_ms: u64) -> bool {
        matches!(self.deadline_ms, Some(deadline) if now_ms >= deadline)
    }

    /// Time left until the deadline, if armed. Zero when already due.
    pub fn remaining(&self, now_ms: u64) -> Option<Duration> {
        self.deadline_ms
            .map(|deadline| Duration::from_millis(deadline.saturating_sub(now_ms)))
    }
}

//! Resend schedule (spec §4.7, resolved per OQ2 "quiet hold"): a fixed
//! list of delays counted from the first send. After the schedule is
//! exhausted the request goes quiet rather than being abandoned outright
//! — it stays in the manager until its TTL expires or a response
//! arrives, it is simply never resent again.

use std::time::Duration;

/// An ordered list of resend delays, each measured from the original
/// send (not from the previous resend).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schedule {
    delays: Vec<Duration>,
}

impl Schedule {
    pub fn new(delays: Vec<Duration>) -> Self {
        Schedule { delays }
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// How many resends (not counting the original send) are due by the
    /// time `elapsed` has passed since the original send.
    pub fn resends_due(&self, elapsed: Duration) -> usize {
        self.delays.iter().filter(|&&d| d <= elapsed).count()
    }

    /// The delay after which the schedule has nothing left to say — once
    /// elapsed passes this point the request is quietly held, not
    /// abandoned, until the caller's own TTL fires.
    pub fn exhausted_after(&self) -> Option<Duration> {
        self.delays.last().copied()
    }
}

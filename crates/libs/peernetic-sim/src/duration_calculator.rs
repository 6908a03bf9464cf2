//! Per-message transit duration, plugged into the simulator (spec §4.9).
//! `std::time::Duration` cannot hold a negative value, so Open Question 3
//! ("the simulator assumes every calculator returns non-negative values —
//! enforce as a validation error, not a silent clamp") is resolved by the
//! type system rather than a runtime check: there is no representable
//! negative duration to clamp or reject in the first place.

use std::time::Duration;

use peernetic_core::Address;

/// Computes how long a message takes in transit from `src` to `dst`,
/// given the `real_duration` the underlying simulated mechanism (e.g. a
/// [`crate::line::FakeLine`]) already assigned it.
pub trait DurationCalculator<P>: Send {
    fn duration(&self, src: &Address, dst: &Address, payload: &P, real_duration: Duration) -> Duration;
}

/// The spec's exemplar calculator (§4.9, §9): always zero. The default
/// used when the caller registers no calculator of its own.
pub struct SimpleActorDurationCalculator;

impl<P> DurationCalculator<P> for SimpleActorDurationCalculator {
    fn duration(&self, _src: &Address, _dst: &Address, _payload: &P, _real_duration: Duration) -> Duration {
        Duration::ZERO
    }
}

impl<P, F> DurationCalculator<P> for F
where
    F: Fn(&Address, &Address, &P, Duration) -> Duration + Send,
{
    fn duration(&self, src: &Address, dst: &Address, payload: &P, real_duration: Duration) -> Duration {
        self(src, dst, payload, real_duration)
    }
}

//! A configurable unreliable channel (loss / jitter / duplication),
//! applied on every hop by the simulator and by the production UDP-sim
//! proxy (spec §4.9, §GLOSSARY "Line"). No teacher file does this; written
//! fresh in the teacher's idiom — small struct, seeded RNG, a couple of
//! methods — because spec.md §4.9 fully specifies `SimpleLine`'s knobs.

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use peernetic_core::Message;

/// `processOutgoing`/`processIncoming` each return zero or more
/// `(message, transit duration)` pairs — zero when the line drops the
/// packet, two when it duplicates it.
pub trait FakeLine<P> {
    fn process_outgoing(&mut self, msg: Message<P>) -> Vec<(Message<P>, Duration)>;
    fn process_incoming(&mut self, msg: Message<P>) -> Vec<(Message<P>, Duration)>;
}

/// Parameters for [`SimpleLine`], fixed at construction.
#[derive(Clone, Debug)]
pub struct SimpleLineConfig {
    pub seed: u64,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub drop_probability: f64,
    pub duplicate_probability: f64,
    pub max_queued: usize,
}

impl Default for SimpleLineConfig {
    fn default() -> Self {
        SimpleLineConfig {
            seed: 0,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            drop_probability: 0.0,
            duplicate_probability: 0.0,
            max_queued: usize::MAX,
        }
    }
}

/// A deterministic-for-a-fixed-seed lossy/jittery/duplicating line.
pub struct SimpleLine<P> {
    config: SimpleLineConfig,
    rng: ChaCha8Rng,
    queued: usize,
    _marker: std::marker::PhantomData<P>,
}

impl<P> SimpleLine<P> {
    pub fn new(config: SimpleLineConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        SimpleLine {
            config,
            rng,
            queued: 0,
            _marker: std::marker::PhantomData,
        }
    }

    fn random_delay(&mut self) -> Duration {
        if self.config.max_delay <= self.config.min_delay {
            return self.config.min_delay;
        }
        let span = (self.config.max_delay - self.config.min_delay).as_nanos() as u64;
        self.config.min_delay + Duration::from_nanos(self.rng.gen_range(0..=span))
    }
}

impl<P: Clone> FakeLine<P> for SimpleLine<P> {
    /// Rolls drop, duplication and jitter, in that order, and enforces the
    /// `max_queued` in-flight bound by dropping packets that would exceed
    /// it (applied after duplication, so a duplicate can itself be the one
    /// that overflows the queue).
    fn process_outgoing(&mut self, msg: Message<P>) -> Vec<(Message<P>, Duration)> {
        if self.rng.gen_bool(self.config.drop_probability.clamp(0.0, 1.0)) {
            return Vec::new();
        }
        let copies = if self.rng.gen_bool(self.config.duplicate_probability.clamp(0.0, 1.0)) {
            2
        } else {
            1
        };
        let mut out = Vec::with_capacity(copies);
        for _ in 0..copies {
            if self.queued >= self.config.max_queued {
                break;
            }
            self.queued += 1;
            out.push((msg.clone(), self.random_delay()));
        }
        out
    }

    /// Arrival side: the line already rolled loss/jitter/duplication on
    /// the outgoing hop, so incoming delivery is a straight pass-through
    /// that simply frees the slot the outgoing side reserved.
    fn process_incoming(&mut self, msg: Message<P>) -> Vec<(Message<P>, Duration)> {
        self.queued = self.queued.saturating_sub(1);
        vec![(msg, Duration::ZERO)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peernetic_core::Address;

    fn msg(payload: &str) -> Message<String> {
        Message::new(Address::parse("a").unwrap(), Address::parse("b").unwrap(), payload.to_string())
    }

    #[test]
    fn zero_drop_zero_duplicate_passes_exactly_one_copy_through() {
        let mut line: SimpleLine<String> = SimpleLine::new(SimpleLineConfig {
            seed: 1,
            ..Default::default()
        });
        for _ in 0..20 {
            let out = line.process_outgoing(msg("hi"));
            assert_eq!(out.len(), 1);
        }
    }

    #[test]
    fn certain_drop_yields_nothing() {
        let mut line: SimpleLine<String> = SimpleLine::new(SimpleLineConfig {
            seed: 1,
            drop_probability: 1.0,
            ..Default::default()
        });
        assert!(line.process_outgoing(msg("hi")).is_empty());
    }

    #[test]
    fn certain_duplicate_yields_two_copies() {
        let mut line: SimpleLine<String> = SimpleLine::new(SimpleLineConfig {
            seed: 1,
            duplicate_probability: 1.0,
            max_queued: 10,
            ..Default::default()
        });
        let out = line.process_outgoing(msg("hi"));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0.payload, "hi");
    }

    #[test]
    fn max_queued_bounds_in_flight_copies() {
        let mut line: SimpleLine<String> = SimpleLine::new(SimpleLineConfig {
            seed: 1,
            duplicate_probability: 1.0,
            max_queued: 1,
            ..Default::default()
        });
        let out = line.process_outgoing(msg("hi"));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn same_seed_is_deterministic() {
        let mut a: SimpleLine<String> = SimpleLine::new(SimpleLineConfig {
            seed: 42,
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
            duplicate_probability: 0.5,
            drop_probability: 0.2,
            max_queued: 100,
        });
        let mut b: SimpleLine<String> = SimpleLine::new(SimpleLineConfig {
            seed: 42,
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
            duplicate_probability: 0.5,
            drop_probability: 0.2,
            max_queued: 100,
        });
        for _ in 0..50 {
            assert_eq!(a.process_outgoing(msg("x")).len(), b.process_outgoing(msg("x")).len());
        }
    }
}

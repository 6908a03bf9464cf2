//! Deterministic, faster-than-real-time executor for peernetic actors
//! (spec §4.9): replaces the real clock and thread pool with an event
//! queue, so the same [`peernetic_core::Actor`] code that runs under a
//! real [`peernetic_core::ActorHost`] also runs here, byte-for-byte
//! reproducibly, given identical inputs.

pub mod clock;
pub mod duration_calculator;
pub mod line;
pub mod recorder;
pub mod replayer;
pub mod simulator;

pub use clock::VirtualClock;
pub use duration_calculator::{DurationCalculator, SimpleActorDurationCalculator};
pub use line::{FakeLine, SimpleLine, SimpleLineConfig};
pub use recorder::{read_all_with_deltas, read_block, write_block, RecordedBlock, RecordedSubMessage};
pub use replayer::replay;
pub use simulator::{Simulator, TraceEntry};

//! Reads a recording back, sleeping the real inter-block deltas, and
//! injects its messages under a caller-specified destination prefix
//! (spec §6: "the replayer reads it, sleeping the real inter-block
//! deltas, and injects messages under a caller-specified destination
//! prefix"). This is a production-side tool, not part of the
//! deterministic event loop itself — it runs against real elapsed time,
//! which is why the sleep function is injected rather than hardcoded to
//! `std::thread::sleep`: tests supply a no-op and assert on the deltas
//! instead of the wall clock.

use std::io::Read;
use std::time::Duration;

use serde::de::DeserializeOwned;

use peernetic_core::{Address, Message};

use crate::recorder::read_all_with_deltas;

/// Replays every block in `reader`, calling `sleep` with each block's
/// delta to the next one before injecting it (so the first block is
/// injected immediately), then handing the block's messages — rewritten
/// under `destination_prefix` — to `inject`.
pub fn replay<R, P, S, I>(
    reader: &mut R,
    destination_prefix: &Address,
    mut sleep: S,
    mut inject: I,
) -> std::io::Result<usize>
where
    R: Read,
    P: DeserializeOwned,
    S: FnMut(Duration),
    I: FnMut(Message<P>),
{
    let blocks = read_all_with_deltas::<_, P>(reader)?;
    let mut injected = 0;
    let mut previous_delta = Duration::ZERO;
    for (block, delta) in blocks {
        sleep(previous_delta);
        for msg in block.into_messages(destination_prefix) {
            inject(msg);
            injected += 1;
        }
        previous_delta = delta;
    }
    Ok(injected)
}

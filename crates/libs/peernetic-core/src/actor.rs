//! The coroutine contract (spec §4.4): an actor is a suspendable
//! computation that processes exactly one incoming message per resume,
//! with local state surviving across suspends.
//!
//! The only observable guarantees are: local variables persist across
//! suspends; each resume corresponds to exactly one incoming message; no
//! shared-memory concurrency within one actor. Here that contract is
//! realized as an explicit state machine — `prime`/`resume` — rather than
//! a stackful fiber or an `async fn` body, so the exact same `Actor` impl
//! can be driven by the real [`crate::host::ActorHost`] and by the
//! deterministic simulator without either one needing to host a second
//! executor.

use std::panic::AssertUnwindSafe;

use crate::address::Address;
use crate::message::Message;

/// What an actor handed back to the host after a resume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActorStatus {
    /// The actor is waiting for its next message.
    Suspended,
    /// The actor returned; its host slot should be freed.
    Terminated,
}

/// Per-actor state valid only during a resume step: self address, current
/// source/destination, current incoming message, outgoing buffer, and an
/// optional checkpoint used for restore.
pub struct ActorContext<P> {
    self_address: Address,
    source: Address,
    destination: Address,
    incoming: Option<P>,
    outgoing: Vec<Message<P>>,
    checkpoint: Option<Vec<u8>>,
}

impl<P> ActorContext<P> {
    pub fn new(self_address: Address) -> Self {
        ActorContext {
            self_address,
            source: Address::empty(),
            destination: Address::empty(),
            incoming: None,
            outgoing: Vec::new(),
            checkpoint: None,
        }
    }

    pub fn self_address(&self) -> &Address {
        &self.self_address
    }

    pub fn source(&self) -> &Address {
        &self.source
    }

    pub fn destination(&self) -> &Address {
        &self.destination
    }

    /// The payload of the message currently being handled. Only meaningful
    /// during a `prime`/`resume` call.
    pub fn incoming(&self) -> Option<&P> {
        self.incoming.as_ref()
    }

    pub fn take_incoming(&mut self) -> Option<P> {
        self.incoming.take()
    }

    /// Queues an outgoing message, addressed from `self_address`.
    pub fn send(&mut self, destination: Address, payload: P) {
        self.outgoing.push(Message::new(
            self.self_address.clone(),
            destination,
            payload,
        ));
    }

    pub fn checkpoint(&self) -> Option<&[u8]> {
        self.checkpoint.as_deref()
    }

    pub fn set_checkpoint(&mut self, bytes: Vec<u8>) {
        self.checkpoint = Some(bytes);
    }

    /// Sets the fields that are only valid for the duration of one resume.
    /// Used by hosts (production and simulated) immediately before calling
    /// `prime`/`resume`.
    pub fn begin_step(&mut self, source: Address, destination: Address, payload: P) {
        self.begin_step_opt(source, destination, Some(payload));
    }

    /// As [`Self::begin_step`], but `payload` may be absent — used when
    /// priming an actor with no priming message.
    pub fn begin_step_opt(&mut self, source: Address, destination: Address, payload: Option<P>) {
        self.source = source;
        self.destination = destination;
        self.incoming = payload;
    }

    pub fn take_outgoing(&mut self) -> Vec<Message<P>> {
        std::mem::take(&mut self.outgoing)
    }
}

/// A suspendable, single-threaded computation hosted by an
/// [`crate::host::ActorHost`] or the simulator.
pub trait Actor<P>: Send {
    /// Called exactly once, with the priming message (if any) already
    /// loaded into `ctx`.
    fn prime(&mut self, ctx: &mut ActorContext<P>) -> ActorStatus;

    /// Called on every subsequent incoming message.
    fn resume(&mut self, ctx: &mut ActorContext<P>) -> ActorStatus;
}

/// Runs one step with panic isolation: an unhandled panic inside `f`
/// terminates only this actor (spec §7, "Actor failure") and is logged as
/// a diagnostic; other actors hosted alongside it are unaffected. Shared
/// by [`crate::host::ActorHost`] and the simulator, since both drive the
/// same `Actor` impls the same way.
pub fn run_guarded<P>(
    host_prefix: &Address,
    local_id: &str,
    f: impl FnOnce(&mut ActorContext<P>) -> ActorStatus,
    ctx: &mut ActorContext<P>,
) -> ActorStatus {
    match std::panic::catch_unwind(AssertUnwindSafe(|| f(ctx))) {
        Ok(status) => status,
        Err(_) => {
            log::warn!(
                "host({host_prefix}): actor '{local_id}' panicked during a step, terminating it"
            );
            ActorStatus::Terminated
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echoer;

    impl Actor<String> for Echoer {
        fn prime(&mut self, _ctx: &mut ActorContext<String>) -> ActorStatus {
            ActorStatus::Suspended
        }

        fn resume(&mut self, ctx: &mut ActorContext<String>) -> ActorStatus {
            let payload = ctx.take_incoming().unwrap_or_default();
            let source = ctx.source().clone();
            ctx.send(source, payload);
            ActorStatus::Suspended
        }
    }

    #[test]
    fn resume_sees_exactly_the_message_it_was_given() {
        let mut ctx = ActorContext::new(Address::parse("a:e").unwrap());
        let mut echoer = Echoer;
        ctx.begin_step(
            Address::parse("b:s").unwrap(),
            Address::parse("a:e").unwrap(),
            "hi".to_string(),
        );
        assert_eq!(echoer.resume(&mut ctx), ActorStatus::Suspended);
        let outgoing = ctx.take_outgoing();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].destination, Address::parse("b:s").unwrap());
        assert_eq!(outgoing[0].payload, "hi");
    }
}

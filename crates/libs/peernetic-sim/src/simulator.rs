//! The deterministic simulator (spec §4.9): a single-threaded event loop
//! on a virtual clock, driving the exact same [`Actor`] impls the real
//! [`peernetic_core::ActorHost`] does. Grounded on `stateright`'s
//! actor-model shape (`other_examples/.../stateright-stateright__src-actor.rs`:
//! "push commands into an `Out` buffer, drain after each step"), adapted
//! to peernetic's suspend/resume `Actor` instead of stateright's callback
//! `on_msg`.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::time::Duration;

use peernetic_core::{run_guarded, Actor, ActorContext, ActorStatus, Address, Message};
use peernetic_timer::parse_timer_destination;

use crate::clock::VirtualClock;
use crate::duration_calculator::{DurationCalculator, SimpleActorDurationCalculator};
use crate::line::FakeLine;

/// One (time, src, dst, payload) delivery, recorded in send order within
/// each virtual instant — the trace testable property 6 compares
/// (spec §8: "Recorded trace matches a fixed golden file across runs").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceEntry<P> {
    pub at: Duration,
    pub source: Address,
    pub destination: Address,
    pub payload: P,
}

enum EventKind<P> {
    Priming(Address),
    Deliver(Message<P>),
}

struct ScheduledEvent<P> {
    deliver_at: Duration,
    sequence: u64,
    kind: EventKind<P>,
}

impl<P> PartialEq for ScheduledEvent<P> {
    fn eq(&self, other: &Self) -> bool {
        self.deliver_at == other.deliver_at && self.sequence == other.sequence
    }
}
impl<P> Eq for ScheduledEvent<P> {}
impl<P> PartialOrd for ScheduledEvent<P> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<P> Ord for ScheduledEvent<P> {
    /// `(deliver_at asc, sequence asc)` — the monotonically increasing
    /// sequence number is the explicit, documented tie-break spec §4.9
    /// requires for determinism.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.deliver_at, self.sequence).cmp(&(other.deliver_at, other.sequence))
    }
}

struct ActorSlot<P> {
    actor: Box<dyn Actor<P>>,
    ctx: ActorContext<P>,
}

/// A registered virtual timer gateway: any message destined under its
/// prefix is treated as a timer request rather than dispatched to a
/// hosted actor (spec §4.8, virtual-clock variant).
struct TimerEntry {
    prefix: Address,
}

/// The deterministic executor: actors, timers and an optional fake line
/// on one virtual clock.
pub struct Simulator<P> {
    clock: VirtualClock,
    queue: BinaryHeap<Reverse<ScheduledEvent<P>>>,
    sequence: u64,
    actors: BTreeMap<Address, ActorSlot<P>>,
    primed: BTreeSet<Address>,
    timers: Vec<TimerEntry>,
    duration_calculator: Box<dyn DurationCalculator<P>>,
    fake_line: Option<Box<dyn FakeLine<P>>>,
    trace: Vec<TraceEntry<P>>,
}

impl<P: Clone + 'static> Simulator<P> {
    pub fn new() -> Self {
        Simulator {
            clock: VirtualClock::start(),
            queue: BinaryHeap::new(),
            sequence: 0,
            actors: BTreeMap::new(),
            primed: BTreeSet::new(),
            timers: Vec::new(),
            duration_calculator: Box::new(SimpleActorDurationCalculator),
            fake_line: None,
            trace: Vec::new(),
        }
    }

    pub fn set_duration_calculator(&mut self, calculator: Box<dyn DurationCalculator<P>>) {
        self.duration_calculator = calculator;
    }

    pub fn set_fake_line(&mut self, line: Box<dyn FakeLine<P>>) {
        self.fake_line = Some(line);
    }

    pub fn clock(&self) -> VirtualClock {
        self.clock
    }

    pub fn trace(&self) -> &[TraceEntry<P>] {
        &self.trace
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn push(&mut self, deliver_at: Duration, kind: EventKind<P>) {
        let sequence = self.next_sequence();
        self.queue.push(Reverse(ScheduledEvent {
            deliver_at,
            sequence,
            kind,
        }));
    }

    /// Registers an actor at `address` and enqueues its priming event at
    /// `start_delay` from now; `priming` is delivered to it at that time
    /// if given.
    pub fn add_coroutine_actor(
        &mut self,
        address: Address,
        actor: Box<dyn Actor<P>>,
        start_delay: Duration,
        priming: Option<Message<P>>,
    ) {
        self.actors.insert(
            address.clone(),
            ActorSlot {
                actor,
                ctx: ActorContext::new(address.clone()),
            },
        );
        let at = self.clock.elapsed() + start_delay;
        match priming {
            Some(msg) => self.push(at, EventKind::Deliver(msg)),
            None => self.push(at, EventKind::Priming(address)),
        }
    }

    /// Registers a virtual timer gateway at `prefix`. Messages destined
    /// under it are handled as timer requests rather than routed to a
    /// hosted actor.
    pub fn add_timer(&mut self, prefix: Address) {
        self.timers.push(TimerEntry { prefix });
    }

    pub fn has_more(&self) -> bool {
        !self.queue.is_empty()
    }

    fn timer_prefix_for(&self, destination: &Address) -> Option<Address> {
        self.timers
            .iter()
            .map(|t| &t.prefix)
            .filter(|prefix| prefix.is_prefix_of(destination))
            .max_by_key(|prefix| prefix.len())
            .cloned()
    }

    fn actor_address_for(&self, destination: &Address) -> Option<Address> {
        self.actors
            .keys()
            .filter(|addr| addr.is_prefix_of(destination))
            .max_by_key(|addr| addr.len())
            .cloned()
    }

    /// Drains exactly one event: advances the clock to its `deliver_at`,
    /// resumes the target (actor priming, actor message, or virtual
    /// timer), collects outgoing messages, and enqueues each as a new
    /// event at `now + duration(...)` (or, for a timer-addressed message,
    /// at `now + millis` back to the source — spec §4.9).
    pub fn process(&mut self) -> bool {
        let Some(Reverse(event)) = self.queue.pop() else {
            return false;
        };
        self.clock.advance_to(event.deliver_at);

        match event.kind {
            EventKind::Priming(address) => {
                self.step_actor(&address, None);
            }
            EventKind::Deliver(msg) => {
                let at = event.deliver_at;
                let incoming = self
                    .fake_line
                    .as_mut()
                    .map(|line| line.process_incoming(msg.clone()))
                    .unwrap_or_else(|| vec![(msg, Duration::ZERO)]);
                for (copy, extra) in incoming {
                    if extra.is_zero() {
                        self.deliver(at, copy);
                    } else {
                        self.push(self.clock.elapsed() + extra, EventKind::Deliver(copy));
                    }
                }
            }
        }
        true
    }

    /// Hands a message that has cleared the incoming line hop to whichever
    /// destination claims it: a virtual timer or the longest-prefix-match
    /// actor, recording it in the trace first (spec §8 testable property
    /// 6).
    fn deliver(&mut self, at: Duration, msg: Message<P>) {
        if let Some(timer_prefix) = self.timer_prefix_for(&msg.destination) {
            self.record(at, &msg);
            self.fire_timer(&timer_prefix, msg);
            return;
        }
        let Some(actor_address) = self.actor_address_for(&msg.destination) else {
            log::warn!("simulator: no actor registered for {}, dropping", msg.destination);
            return;
        };
        self.record(at, &msg);
        self.step_actor(&actor_address, Some(msg));
    }

    fn fire_timer(&mut self, prefix: &Address, msg: Message<P>) {
        let Some((delay, _suffix)) = parse_timer_destination(prefix, &msg.destination) else {
            log::warn!("simulator: malformed timer destination {}, dropping", msg.destination);
            return;
        };
        let reply = Message::new(prefix.clone(), msg.source, msg.payload);
        let at = self.clock.elapsed() + delay;
        self.push(at, EventKind::Deliver(reply));
    }

    fn step_actor(&mut self, address: &Address, msg: Option<Message<P>>) {
        let Some(slot) = self.actors.get_mut(address) else {
            log::warn!("simulator: actor {address} vanished before its scheduled step");
            return;
        };
        let (source, destination, payload) = match msg {
            Some(m) => (m.source, m.destination, Some(m.payload)),
            None => (Address::empty(), address.clone(), None),
        };
        slot.ctx.begin_step_opt(source, destination, payload);

        let is_first_step = self.primed.insert(address.clone());
        let status = if is_first_step {
            run_guarded(address, "sim", |ctx| slot.actor.prime(ctx), &mut slot.ctx)
        } else {
            run_guarded(address, "sim", |ctx| slot.actor.resume(ctx), &mut slot.ctx)
        };
        let outgoing = slot.ctx.take_outgoing();
        if status == ActorStatus::Terminated {
            self.actors.remove(address);
        }
        self.dispatch_outgoing(address, outgoing);
    }

    fn dispatch_outgoing(&mut self, from: &Address, outgoing: Vec<Message<P>>) {
        for msg in outgoing {
            let transit = self
                .fake_line
                .as_mut()
                .map(|line| line.process_outgoing(msg.clone()))
                .unwrap_or_else(|| vec![(msg.clone(), Duration::ZERO)]);
            for (transit_msg, real_duration) in transit {
                let extra = self.duration_calculator.duration(
                    from,
                    &transit_msg.destination,
                    &transit_msg.payload,
                    real_duration,
                );
                let at = self.clock.elapsed() + extra;
                self.push(at, EventKind::Deliver(transit_msg));
            }
        }
    }

    fn record(&mut self, at: Duration, msg: &Message<P>) {
        self.trace.push(TraceEntry {
            at,
            source: msg.source.clone(),
            destination: msg.destination.clone(),
            payload: msg.payload.clone(),
        });
    }
}

impl<P: Clone + 'static> Default for Simulator<P> {
    fn default() -> Self {
        Self::new()
    }
}

//! Timer gateway (spec §4.8): a [`peernetic_core::Shuttle`] whose prefix is
//! configurable (commonly `"timer"`). A message destined for
//! `<prefix>:<millis>[:suffix...]` schedules a reply carrying the original
//! payload, sent back to the original source after `millis` milliseconds.
//!
//! Production uses a single `tokio::time::sleep` task per scheduled reply
//! (grounded on the teacher's tokio-task-per-job shape in
//! `styrene-rns-transport::transport::jobs`); the simulator drives the
//! identical parsing/addressing logic against its own virtual clock
//! instead of real time (spec §4.9), through [`parse_timer_destination`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use peernetic_core::{Address, Message, Shuttle};

/// Parses `<prefix>:<millis>[:suffix...]`, returning the delay and the
/// suffix elements to preserve on the reply's destination. Malformed
/// millis is reported to the caller so it can log-and-drop per spec
/// rather than silently misbehaving (spec §4.8: "Malformed millis → drop
/// with warning").
pub fn parse_timer_destination(prefix: &Address, destination: &Address) -> Option<(Duration, Address)> {
    if !prefix.is_prefix_of(destination) {
        return None;
    }
    let rest = prefix.remove_prefix(destination).ok()?;
    let millis_str = rest.element(0)?;
    let millis: u64 = millis_str.parse().ok()?;
    let suffix = Address::from_elements(rest.elements()[1..].to_vec()).ok()?;
    Some((Duration::from_millis(millis), suffix))
}

/// A scheduled timer reply: who to reply to, what to send back, and after
/// what delay.
#[derive(Clone, Debug)]
pub struct TimerFiring<P> {
    pub reply_to: Address,
    pub payload: P,
    pub delay: Duration,
}

/// Accepts a timer-addressed message and decides what (if anything) should
/// fire and when. Shared by the production gateway (which hands the result
/// to a real `tokio::time::sleep`) and the simulator (which schedules it
/// against the virtual clock via `peernetic-sim`).
pub fn schedule_firing<P>(prefix: &Address, msg: Message<P>) -> Option<TimerFiring<P>> {
    let (delay, _suffix) = parse_timer_destination(prefix, &msg.destination)?;
    Some(TimerFiring {
        reply_to: msg.source,
        payload: msg.payload,
        delay,
    })
}

/// The production timer gateway: a [`Shuttle`] backed by one
/// `tokio::time::sleep` task per firing, delivering the reply through the
/// given outgoing shuttle once it elapses.
pub struct TimerGateway<P> {
    prefix: Address,
    outgoing: Arc<dyn Shuttle<P>>,
}

impl<P: Send + Sync + 'static> TimerGateway<P> {
    pub fn new(prefix: Address, outgoing: Arc<dyn Shuttle<P>>) -> Arc<Self> {
        Arc::new(TimerGateway { prefix, outgoing })
    }
}

#[async_trait]
impl<P: Send + Sync + 'static> Shuttle<P> for TimerGateway<P> {
    fn prefix(&self) -> &Address {
        &self.prefix
    }

    async fn submit(&self, batch: Vec<Message<P>>) {
        for msg in batch {
            let Some(firing) = schedule_firing(&self.prefix, msg) else {
                log::warn!("timer({}): malformed timer destination, dropping", self.prefix);
                continue;
            };
            let outgoing = self.outgoing.clone();
            let prefix = self.prefix.clone();
            tokio::spawn(async move {
                tokio::time::sleep(firing.delay).await;
                let reply = Message::new(prefix, firing.reply_to.clone(), firing.payload);
                outgoing.submit(vec![reply]).await;
            });
        }
    }
}

/// A channel-backed handle a test or CLI can use to await a firing without
/// racing the spawned `tokio::time::sleep` task directly.
pub fn firing_channel<P: Send + 'static>() -> (mpsc::UnboundedSender<Message<P>>, mpsc::UnboundedReceiver<Message<P>>) {
    mpsc::unbounded_channel()
}

//! The actor host (a.k.a. runner): hosts one or more actors cooperatively
//! behind one inbound [`Bus`], draining it on a dedicated worker task and
//! dispatching each delivered message to the actor it names.
//!
//! While an actor is resumed, no other actor on the same host runs — the
//! `actors` map is guarded by a single `tokio::sync::Mutex` that is held
//! for the duration of one resume step, never across an `.await` that
//! waits on another actor.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use crate::actor::{run_guarded, Actor, ActorContext, ActorStatus};
use crate::address::Address;
use crate::bus::{Bus, BusRecord};
use crate::message::Message;
use crate::shuttle::{BusShuttle, Shuttle};

struct ActorSlot<P> {
    actor: Box<dyn Actor<P>>,
    ctx: ActorContext<P>,
}

/// Hosts actors under one address prefix. The local id of an actor is the
/// destination element immediately following the host's own prefix
/// (generalizing spec §4.3's "destination element[1]" to hosts whose
/// prefix is more than one element deep).
pub struct ActorHost<P> {
    prefix: Address,
    bus: Arc<Bus<P>>,
    outgoing: RwLock<HashMap<Address, Arc<dyn Shuttle<P>>>>,
    actors: Mutex<BTreeMap<String, ActorSlot<P>>>,
}

impl<P: Send + Sync + 'static> ActorHost<P> {
    pub fn new(prefix: Address) -> Arc<Self> {
        Arc::new(ActorHost {
            prefix,
            bus: Arc::new(Bus::unbounded()),
            outgoing: RwLock::new(HashMap::new()),
            actors: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn prefix(&self) -> &Address {
        &self.prefix
    }

    /// The shuttle other components submit messages to for this host.
    pub fn incoming_shuttle(&self) -> Arc<dyn Shuttle<P>> {
        Arc::new(BusShuttle::new(self.prefix.clone(), self.bus.clone()))
    }

    pub async fn add_outgoing_shuttle(&self, prefix: Address, shuttle: Arc<dyn Shuttle<P>>) {
        self.outgoing.write().await.insert(prefix, shuttle);
    }

    pub async fn remove_outgoing_shuttle(&self, prefix: &Address) {
        self.outgoing.write().await.remove(prefix);
    }

    /// Creates actor state under `local_id` and, if `priming` is given,
    /// delivers it synchronously — as if it had just arrived — before
    /// returning.
    pub async fn add_actor(
        &self,
        local_id: impl Into<String>,
        mut actor: Box<dyn Actor<P>>,
        priming: Option<Message<P>>,
    ) {
        let local_id = local_id.into();
        let self_address = self.prefix.append(&Address::parse(&local_id).unwrap_or_else(|_| {
            // local ids are framework-chosen identifiers, not user input; a
            // non-empty id never fails to parse as a single element.
            Address::empty()
        }));
        let mut ctx = ActorContext::new(self_address);
        let (source, destination, payload) = match priming {
            Some(msg) => (msg.source, msg.destination, Some(msg.payload)),
            None => (Address::empty(), Address::empty(), None),
        };
        ctx.begin_step_opt(source, destination, payload);

        let status = run_guarded(&self.prefix, &local_id, |ctx| actor.prime(ctx), &mut ctx);
        let outgoing = ctx.take_outgoing();

        let mut actors = self.actors.lock().await;
        match status {
            ActorStatus::Suspended => {
                actors.insert(local_id, ActorSlot { actor, ctx });
            }
            ActorStatus::Terminated => {
                log::debug!("host({}): actor '{}' terminated during priming", self.prefix, local_id);
            }
        }
        drop(actors);
        self.route_outgoing(outgoing).await;
    }

    /// Terminates `local_id` after its current step (immediate, since the
    /// `actors` lock already serializes against any in-flight step).
    pub async fn remove_actor(&self, local_id: &str) {
        self.actors.lock().await.remove(local_id);
    }

    async fn dispatch_message(&self, msg: Message<P>) {
        let Some(local_id) = self.local_id_of(&msg.destination) else {
            log::warn!(
                "host({}): message to {} has no local id under this prefix, dropping",
                self.prefix,
                msg.destination
            );
            return;
        };

        let mut actors = self.actors.lock().await;
        let Some(slot) = actors.get_mut(&local_id) else {
            log::warn!("host({}): no actor '{}', dropping message", self.prefix, local_id);
            return;
        };
        slot.ctx.begin_step_opt(msg.source, msg.destination, Some(msg.payload));
        let status = run_guarded(&self.prefix, &local_id, |ctx| slot.actor.resume(ctx), &mut slot.ctx);
        let outgoing = slot.ctx.take_outgoing();
        if status == ActorStatus::Terminated {
            actors.remove(&local_id);
        }
        drop(actors);
        self.route_outgoing(outgoing).await;
    }

    fn local_id_of(&self, destination: &Address) -> Option<String> {
        destination.element(self.prefix.len()).map(str::to_string)
    }

    async fn route_outgoing(&self, outgoing: Vec<Message<P>>) {
        let mut groups: Vec<(Address, Vec<Message<P>>)> = Vec::new();
        for msg in outgoing {
            let Some(first) = msg.destination.element(0) else {
                continue;
            };
            let Ok(target_prefix) = Address::parse(first) else {
                continue;
            };
            if let Some(group) = groups.iter_mut().find(|(p, _)| p == &target_prefix) {
                group.1.push(msg);
            } else {
                groups.push((target_prefix, vec![msg]));
            }
        }
        for (prefix, batch) in groups {
            let shuttle = self.outgoing.read().await.get(&prefix).cloned();
            match shuttle {
                Some(shuttle) => shuttle.submit(batch).await,
                None => log::warn!("host({}): no outgoing shuttle for {}", self.prefix, prefix),
            }
        }
    }

    /// The dispatch loop: drains the inbound bus and processes records in
    /// order until closed. Intended to be `tokio::spawn`ed.
    pub async fn run(self: Arc<Self>) {
        loop {
            let batch = self.bus.drain(64, Duration::from_millis(200)).await;
            if batch.is_empty() {
                if self.bus.is_closed().await {
                    return;
                }
                continue;
            }
            for record in batch {
                match record {
                    BusRecord::AddOutgoingShuttle(prefix, shuttle) => {
                        self.outgoing.write().await.insert(prefix, shuttle);
                    }
                    BusRecord::RemoveOutgoingShuttle(prefix) => {
                        self.outgoing.write().await.remove(&prefix);
                    }
                    BusRecord::Deliver(messages) => {
                        for msg in messages {
                            self.dispatch_message(msg).await;
                        }
                    }
                    BusRecord::Close => {
                        self.bus.close().await;
                        return;
                    }
                }
            }
        }
    }

    pub async fn close(&self) {
        self.bus.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

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

    struct Panicker;

    impl Actor<String> for Panicker {
        fn prime(&mut self, _ctx: &mut ActorContext<String>) -> ActorStatus {
            ActorStatus::Suspended
        }

        fn resume(&mut self, _ctx: &mut ActorContext<String>) -> ActorStatus {
            panic!("boom");
        }
    }

    struct CountingEchoer(Arc<AtomicUsize>);

    impl Actor<String> for CountingEchoer {
        fn prime(&mut self, _ctx: &mut ActorContext<String>) -> ActorStatus {
            ActorStatus::Suspended
        }
        fn resume(&mut self, ctx: &mut ActorContext<String>) -> ActorStatus {
            self.0.fetch_add(1, Ordering::SeqCst);
            let payload = ctx.take_incoming().unwrap_or_default();
            let source = ctx.source().clone();
            ctx.send(source, payload);
            ActorStatus::Suspended
        }
    }

    #[tokio::test]
    async fn echo_scenario_end_to_end() {
        let host: Arc<ActorHost<String>> = ActorHost::new(Address::parse("a").unwrap());
        host.add_actor("e", Box::new(Echoer), None).await;

        let capture: Arc<std::sync::Mutex<Vec<Message<String>>>> =
            Arc::new(std::sync::Mutex::new(Vec::new()));
        let capture_clone = capture.clone();
        let sender_host: Arc<ActorHost<String>> = ActorHost::new(Address::parse("b").unwrap());
        struct Recorder(Arc<std::sync::Mutex<Vec<Message<String>>>>);
        impl Actor<String> for Recorder {
            fn prime(&mut self, _ctx: &mut ActorContext<String>) -> ActorStatus {
                ActorStatus::Suspended
            }
            fn resume(&mut self, ctx: &mut ActorContext<String>) -> ActorStatus {
                let payload = ctx.take_incoming().unwrap_or_default();
                let msg = Message::new(ctx.source().clone(), ctx.destination().clone(), payload);
                self.0.lock().unwrap().push(msg);
                ActorStatus::Suspended
            }
        }
        sender_host
            .add_actor("s", Box::new(Recorder(capture_clone)), None)
            .await;

        host.add_outgoing_shuttle(Address::parse("b").unwrap(), sender_host.incoming_shuttle())
            .await;
        sender_host
            .add_outgoing_shuttle(Address::parse("a").unwrap(), host.incoming_shuttle())
            .await;

        let runner = tokio::spawn(host.clone().run());
        let sender_runner = tokio::spawn(sender_host.clone().run());

        host.incoming_shuttle()
            .submit(vec![Message::new(
                Address::parse("b:s").unwrap(),
                Address::parse("a:e").unwrap(),
                "hi".to_string(),
            )])
            .await;

        tokio::time::sleep(StdDuration::from_millis(100)).await;
        host.close().await;
        sender_host.close().await;
        let _ = runner.await;
        let _ = sender_runner.await;

        let captured = capture.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].payload, "hi");
        assert_eq!(captured[0].source, Address::parse("a:e").unwrap());
    }

    #[tokio::test]
    async fn unknown_local_id_is_dropped_not_fatal() {
        let host: Arc<ActorHost<String>> = ActorHost::new(Address::parse("a").unwrap());
        host.add_actor("e", Box::new(Echoer), None).await;
        let runner = tokio::spawn(host.clone().run());
        host.incoming_shuttle()
            .submit(vec![Message::new(
                Address::empty(),
                Address::parse("a:ghost").unwrap(),
                "hi".to_string(),
            )])
            .await;
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        host.close().await;
        let _ = runner.await;
    }

    #[tokio::test]
    async fn panicking_actor_is_terminated_others_unaffected() {
        let host: Arc<ActorHost<String>> = ActorHost::new(Address::parse("a").unwrap());
        let count = Arc::new(AtomicUsize::new(0));
        host.add_actor("boom", Box::new(Panicker), None).await;
        host.add_actor("e", Box::new(CountingEchoer(count.clone())), None)
            .await;
        let runner = tokio::spawn(host.clone().run());

        host.incoming_shuttle()
            .submit(vec![Message::new(
                Address::empty(),
                Address::parse("a:boom").unwrap(),
                "x".to_string(),
            )])
            .await;
        host.incoming_shuttle()
            .submit(vec![Message::new(
                Address::empty(),
                Address::parse("a:e").unwrap(),
                "y".to_string(),
            )])
            .await;
        tokio::time::sleep(StdDuration::from_millis(100)).await;
        host.close().await;
        let _ = runner.await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        // the panicking actor's slot must have been removed
        host.remove_actor("boom").await; // no-op, already gone; exercises idempotence
    }
}

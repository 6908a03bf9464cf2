//! The end-to-end scenarios from spec §8, runnable from the CLI for
//! manual smoke-testing: echo, timer round-trip, request resend, and a
//! small Chord lookup.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;

use peernetic_chord::{ChordMessage, ChordNode};
use peernetic_core::{Actor, ActorContext, ActorHost, ActorStatus, Address, Message};
use peernetic_sim::Simulator;
use peernetic_transmission::schedule::Schedule;
use peernetic_transmission::{ClassificationPolicy, PayloadKind, TransmissionEvent, TransmissionManager};

use crate::config::EchoConfig;

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

struct Recorder {
    received: Vec<(Address, String)>,
}
impl Actor<String> for Recorder {
    fn prime(&mut self, ctx: &mut ActorContext<String>) -> ActorStatus {
        self.resume(ctx)
    }
    fn resume(&mut self, ctx: &mut ActorContext<String>) -> ActorStatus {
        if let Some(payload) = ctx.take_incoming() {
            self.received.push((ctx.source().clone(), payload));
        }
        ActorStatus::Suspended
    }
}

/// Echo scenario (spec §8): one echoer at `a:e`, one sender at `b:s`
/// sending `"hi"`; the sender receives `"hi"` back.
pub fn run_echo() -> anyhow::Result<()> {
    let mut sim: Simulator<String> = Simulator::new();
    let echoer = Address::parse("a:e")?;
    let sender = Address::parse("b:s")?;
    sim.add_coroutine_actor(echoer.clone(), Box::new(Echoer), Duration::ZERO, None);
    sim.add_coroutine_actor(
        sender.clone(),
        Box::new(Recorder { received: Vec::new() }),
        Duration::ZERO,
        Some(Message::new(sender.clone(), echoer, "hi".to_string())),
    );
    while sim.process() {}

    let reply = sim
        .trace()
        .iter()
        .find(|e| e.destination == sender)
        .context("sender never received a reply")?;
    println!("echo: sender received {:?} from {}", reply.payload, reply.source);
    Ok(())
}

/// Timer round-trip scenario (spec §8): `a:x` sends `42` to `timer:250`;
/// after virtual time advances >= 250ms it gets `42` back from `timer`.
pub fn run_timer() -> anyhow::Result<()> {
    struct SendOnce;
    impl Actor<u32> for SendOnce {
        fn prime(&mut self, ctx: &mut ActorContext<u32>) -> ActorStatus {
            ctx.send(
                Address::parse("timer:250").expect("literal address is well-formed"),
                42,
            );
            ActorStatus::Suspended
        }
        fn resume(&mut self, _ctx: &mut ActorContext<u32>) -> ActorStatus {
            ActorStatus::Suspended
        }
    }

    let mut sim: Simulator<u32> = Simulator::new();
    sim.add_timer(Address::parse("timer")?);
    let actor = Address::parse("a:x")?;
    sim.add_coroutine_actor(actor.clone(), Box::new(SendOnce), Duration::ZERO, None);
    while sim.process() {}

    let reply = sim
        .trace()
        .iter()
        .find(|e| e.destination == actor)
        .context("actor never received the timer reply")?;
    println!(
        "timer: reply {:?} received at virtual time {:?} (elapsed {:?})",
        reply.payload,
        reply.at,
        sim.clock().elapsed()
    );
    Ok(())
}

/// Request resend scenario (spec §8): schedule `[100ms, 200ms, 400ms]`,
/// peer drops the first two copies; within <=700ms the peer has received
/// 3 copies and responded once, and the sender receives exactly one
/// response. Driven with fabricated `Instant` arithmetic (`t0 + Duration`)
/// rather than real sleeps, since `TransmissionManager` is clock-agnostic
/// (spec §4.6/§4.7: callers thread a consistent clock, never sample it
/// internally).
pub fn run_resend() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let request_policy = ClassificationPolicy {
        kind: PayloadKind::Request,
        resend_schedule: Schedule::new(vec![
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(400),
        ]),
        discard_after: Duration::from_secs(2),
    };
    let response_policy = ClassificationPolicy {
        kind: PayloadKind::Response,
        resend_schedule: Schedule::new(vec![]),
        discard_after: Duration::from_secs(2),
    };

    let mut sender: TransmissionManager<u64, String> = TransmissionManager::new();
    let mut peer: TransmissionManager<u64, String> = TransmissionManager::new();
    let peer_addr = Address::parse("peer")?;
    let nonce = 1u64;

    let mut copies_sent = 0usize;
    let mut copies_peer_saw = 0usize;
    let mut responses_delivered = 0usize;

    let first = sender
        .send_request(t0, peer_addr.clone(), nonce, "ping".to_string(), &request_policy)
        .context("first send must go out")?;
    copies_sent += 1;
    println!("resend: copy {copies_sent} sent ({:?}) — dropped by peer", first.payload);

    for elapsed_ms in [100u64, 300] {
        let resends = sender.tick_resends(t0 + Duration::from_millis(elapsed_ms));
        for resend in resends {
            copies_sent += 1;
            if copies_sent <= 2 {
                println!("resend: copy {copies_sent} sent ({:?}) — dropped by peer", resend.payload);
            } else {
                copies_peer_saw += 1;
                println!("resend: copy {copies_sent} sent ({:?}) — peer receives it", resend.payload);
                let now = t0 + Duration::from_millis(elapsed_ms);
                if let Some(TransmissionEvent::DeliverUpstream(payload)) =
                    peer.receive_request(now, nonce, resend.payload, &request_policy)
                {
                    let response = peer
                        .send_response(now, resend.source.clone(), nonce, format!("pong: {payload}"), &response_policy)
                        .context("peer must be able to answer a fresh request")?;
                    if let Some(TransmissionEvent::DeliverUpstream(payload)) =
                        sender.receive_response(now, nonce, response.payload, &response_policy)
                    {
                        responses_delivered += 1;
                        println!("resend: sender received response {payload:?}");
                    }
                }
            }
        }
    }

    // A further tick after the response arrived must produce nothing —
    // resends are cancelled by the request's absence, not an explicit flag.
    let trailing = sender.tick_resends(t0 + Duration::from_millis(700));
    println!(
        "resend: done — {copies_sent} copies sent, peer saw {copies_peer_saw}, \
         {responses_delivered} response(s) delivered, {} trailing resend(s)",
        trailing.len()
    );
    Ok(())
}

/// Chord scenario: a handful of nodes notify each other, then one node
/// looks up a ring id, routing hop-by-hop through finger tables.
pub fn run_chord() -> anyhow::Result<()> {
    let bit_count = 6;
    let ids = [0u64, 16, 32, 48];

    let mut sim: Simulator<ChordMessage> = Simulator::new();
    for &id in &ids {
        let addr = Address::parse(&format!("node{id}"))?;
        sim.add_coroutine_actor(addr.clone(), Box::new(ChordNode::new(id, bit_count, addr)), Duration::ZERO, None);
    }
    // A one-shot driver per node feeds it a Notify about every other node,
    // in id order, so the simulator's determinism invariant (no hash-order
    // iteration) is preserved. It is a separate actor — addresses already
    // hosting a ChordNode must not be re-registered, or the node's
    // finger-table state would be replaced rather than reused.
    for &from in &ids {
        let from_addr = Address::parse(&format!("node{from}"))?;
        let notifies: Vec<ChordMessage> = ids
            .iter()
            .filter(|&&other| other != from)
            .map(|&other| ChordMessage::Notify {
                id: other,
                address: Address::parse(&format!("node{other}"))
                    .expect("node id formats to a well-formed address"),
            })
            .collect();
        let driver_addr = Address::parse(&format!("driver{from}"))?;
        sim.add_coroutine_actor(
            driver_addr,
            Box::new(NotifyDriver { target: from_addr, notifies }),
            Duration::ZERO,
            None,
        );
    }

    // Started one virtual millisecond after the drivers so it sorts after
    // every zero-delay Notify delivery by `deliver_at`, not by
    // registration-order sequence — otherwise the lookup could reach a
    // node before its finger table has learned about its peers.
    let requester = Address::parse("requester")?;
    sim.add_coroutine_actor(
        requester.clone(),
        Box::new(Recorder2),
        Duration::from_millis(1),
        Some(Message::new(
            requester.clone(),
            Address::parse("node0")?,
            ChordMessage::FindSuccessor { id: 40, origin: requester.clone() },
        )),
    );
    while sim.process() {}

    let reply = sim
        .trace()
        .iter()
        .find(|e| e.destination == requester)
        .context("requester never received a FoundSuccessor reply")?;
    println!("chord: lookup for id 40 resolved to {:?}", reply.payload);
    Ok(())
}

/// Sends every queued `Notify` to `target` on its first (and only) step.
struct NotifyDriver {
    target: Address,
    notifies: Vec<ChordMessage>,
}
impl Actor<ChordMessage> for NotifyDriver {
    fn prime(&mut self, ctx: &mut ActorContext<ChordMessage>) -> ActorStatus {
        for notify in self.notifies.drain(..) {
            ctx.send(self.target.clone(), notify);
        }
        ActorStatus::Terminated
    }
    fn resume(&mut self, _ctx: &mut ActorContext<ChordMessage>) -> ActorStatus {
        ActorStatus::Terminated
    }
}

struct Recorder2;
impl Actor<ChordMessage> for Recorder2 {
    fn prime(&mut self, ctx: &mut ActorContext<ChordMessage>) -> ActorStatus {
        self.resume(ctx)
    }
    fn resume(&mut self, _ctx: &mut ActorContext<ChordMessage>) -> ActorStatus {
        ActorStatus::Suspended
    }
}

/// Wires two real tokio-backed [`ActorHost`]s from an [`EchoConfig`] and
/// runs the echo scenario over them end to end.
pub async fn run_config_echo(cfg: EchoConfig) -> anyhow::Result<()> {
    let echoer_prefix = Address::parse(&cfg.echoer_prefix)?;
    let sender_prefix = Address::parse(&cfg.sender_prefix)?;

    let echoer_host: Arc<ActorHost<String>> = ActorHost::new(echoer_prefix.clone());
    let sender_host: Arc<ActorHost<String>> = ActorHost::new(sender_prefix.clone());

    echoer_host.add_actor(cfg.echoer_id.clone(), Box::new(Echoer), None).await;
    let capture = Arc::new(std::sync::Mutex::new(Vec::<(Address, String)>::new()));
    struct CapturingRecorder(Arc<std::sync::Mutex<Vec<(Address, String)>>>);
    impl Actor<String> for CapturingRecorder {
        fn prime(&mut self, ctx: &mut ActorContext<String>) -> ActorStatus {
            self.resume(ctx)
        }
        fn resume(&mut self, ctx: &mut ActorContext<String>) -> ActorStatus {
            if let Some(payload) = ctx.take_incoming() {
                self.0.lock().unwrap().push((ctx.source().clone(), payload));
            }
            ActorStatus::Suspended
        }
    }
    sender_host
        .add_actor(cfg.sender_id.clone(), Box::new(CapturingRecorder(capture.clone())), None)
        .await;

    echoer_host
        .add_outgoing_shuttle(sender_prefix.clone(), sender_host.incoming_shuttle())
        .await;
    sender_host
        .add_outgoing_shuttle(echoer_prefix.clone(), echoer_host.incoming_shuttle())
        .await;

    let echoer_runner = tokio::spawn(echoer_host.clone().run());
    let sender_runner = tokio::spawn(sender_host.clone().run());

    let sender_addr = sender_prefix.append(&Address::parse(&cfg.sender_id)?);
    let echoer_addr = echoer_prefix.append(&Address::parse(&cfg.echoer_id)?);
    echoer_host
        .incoming_shuttle()
        .submit(vec![Message::new(sender_addr, echoer_addr, cfg.payload.clone())])
        .await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    echoer_host.close().await;
    sender_host.close().await;
    let _ = echoer_runner.await;
    let _ = sender_runner.await;

    let received = capture.lock().unwrap();
    match received.first() {
        Some((from, payload)) => println!("run: sender received {payload:?} from {from}"),
        None => println!("run: sender received nothing within the wait window"),
    }
    Ok(())
}

//! At-least-once request/response reliability sitting between business
//! logic and a network-facing [`peernetic_core::Shuttle`] (spec §4.6).
//!
//! Four nonce-keyed maps — outgoing requests, outgoing responses, incoming
//! requests, incoming responses — each with its own lifecycle. Grounded on
//! the teacher's `PacketCache` (`styrene-rns-transport::transport::packet_cache`):
//! a hash-keyed map with a `release(duration)` sweep, generalized here to
//! four distinct lifecycles and driven by an explicit `now` rather than a
//! sampled clock.

pub mod nonce_manager;
pub mod schedule;

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use thiserror::Error;

use peernetic_core::{Address, Message};
use schedule::Schedule;

/// Whether a payload type is classified as a request or a response, and
/// the policy that governs it. One instance per payload "kind" a peer
/// exchanges; supplied by the caller, never inferred.
#[derive(Clone, Debug)]
pub struct ClassificationPolicy {
    pub kind: PayloadKind,
    pub resend_schedule: Schedule,
    pub discard_after: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadKind {
    Request,
    Response,
}

/// Extracts the nonce from a payload. The framework never synthesizes
/// nonces; it reads them through this pluggable accessor (spec §3).
pub trait NonceAccessor<P, N> {
    fn get(&self, payload: &P) -> Option<N>;
}

impl<P, N, F> NonceAccessor<P, N> for F
where
    F: Fn(&P) -> Option<N>,
{
    fn get(&self, payload: &P) -> Option<N> {
        self(payload)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransmissionError {
    #[error("nonce accessor could not extract a nonce from this payload")]
    NoNonce,
    #[error("a response for this nonce has already been sent")]
    ResponseAlreadySent,
}

impl TransmissionError {
    /// `true` for errors a caller could plausibly retry past (none, today —
    /// both kinds here are permanent misuse of the same nonce/payload, not
    /// a transient condition). Kept as the uniform per-crate helper the
    /// workspace's error shape calls for (see `styrene-ipc::IpcError`).
    pub fn is_retryable(&self) -> bool {
        false
    }
}

struct OutgoingRequestState<P> {
    endpoint: Address,
    message: P,
    send_count: u32,
    sent_at: Instant,
    schedule: Schedule,
}

struct OutgoingResponseState;

struct IncomingRequestState;

struct IncomingResponseState;

/// Events a [`TransmissionManager`] step may hand back to its caller: a
/// delivery to upstream business logic, a message to actually put on the
/// wire, or a diagnostic outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransmissionEvent<P> {
    /// Deliver `payload` to the application layer (a fresh incoming
    /// request or response, not a duplicate).
    DeliverUpstream(P),
    /// A typed timeout surfaced to the originator (spec §7, "Protocol").
    RequestTimedOut { endpoint: Address, payload: P },
}

/// The transmission subsystem's per-actor state: four nonce-keyed maps
/// plus the classification policy for each payload kind it handles.
///
/// Not thread-safe (spec §5): lives inside exactly one actor, driven by
/// that actor's single-threaded resume steps.
pub struct TransmissionManager<N, P> {
    outgoing_requests: HashMap<N, OutgoingRequestState<P>>,
    outgoing_responses: HashMap<N, OutgoingResponseState>,
    incoming_requests: HashMap<N, IncomingRequestState>,
    incoming_responses: HashMap<N, IncomingResponseState>,
    discard_at: nonce_manager::NonceManager<N, ()>,
}

impl<N, P> Default for TransmissionManager<N, P>
where
    N: Eq + Hash + Clone,
    P: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<N, P> TransmissionManager<N, P>
where
    N: Eq + Hash + Clone,
    P: Clone,
{
    pub fn new() -> Self {
        TransmissionManager {
            outgoing_requests: HashMap::new(),
            outgoing_responses: HashMap::new(),
            incoming_requests: HashMap::new(),
            incoming_responses: HashMap::new(),
            discard_at: nonce_manager::NonceManager::new(),
        }
    }

    /// Sends a fresh outgoing request. If `nonce` is already outstanding,
    /// the send is dropped (spec §4.6: "if already present ... drop
    /// (warning)") and `None` is returned — nothing goes on the wire.
    /// Otherwise returns the message to submit immediately, having
    /// registered resend/discard state.
    pub fn send_request(
        &mut self,
        now: Instant,
        endpoint: Address,
        nonce: N,
        payload: P,
        policy: &ClassificationPolicy,
    ) -> Option<Message<P>> {
        if self.outgoing_requests.contains_key(&nonce) {
            log::warn!("transmission: outgoing request nonce already pending, dropping resend");
            return None;
        }
        let _ = self.discard_at.add_nonce(now, policy.discard_after, nonce.clone(), None);
        self.outgoing_requests.insert(
            nonce.clone(),
            OutgoingRequestState {
                endpoint: endpoint.clone(),
                message: payload.clone(),
                send_count: 1,
                sent_at: now,
                schedule: policy.resend_schedule.clone(),
            },
        );
        Some(Message::new(Address::empty(), endpoint, payload))
    }

    /// Registers and sends a fresh outgoing response. Fails with
    /// [`TransmissionError::ResponseAlreadySent`] if this nonce already
    /// has a response on record.
    pub fn send_response(
        &mut self,
        now: Instant,
        endpoint: Address,
        nonce: N,
        payload: P,
        policy: &ClassificationPolicy,
    ) -> Result<Message<P>, TransmissionError> {
        if self.outgoing_responses.contains_key(&nonce) {
            return Err(TransmissionError::ResponseAlreadySent);
        }
        let _ = self.discard_at.add_nonce(now, policy.discard_after, nonce.clone(), None);
        self.outgoing_responses.insert(nonce, OutgoingResponseState);
        Ok(Message::new(Address::empty(), endpoint, payload))
    }

    /// Handles an incoming request. Drops request-to-self (a nonce we
    /// ourselves have outstanding as an outgoing request) and duplicates
    /// of an already-seen incoming request; otherwise registers it and
    /// delivers upstream.
    pub fn receive_request(
        &mut self,
        now: Instant,
        nonce: N,
        payload: P,
        policy: &ClassificationPolicy,
    ) -> Option<TransmissionEvent<P>> {
        if self.outgoing_requests.contains_key(&nonce) {
            log::debug!("transmission: incoming request matches our own outgoing nonce, dropping");
            return None;
        }
        if self.incoming_requests.contains_key(&nonce) {
            return None;
        }
        let _ = self.discard_at.add_nonce(now, policy.discard_after, nonce.clone(), None);
        self.incoming_requests.insert(nonce, IncomingRequestState);
        Some(TransmissionEvent::DeliverUpstream(payload))
    }

    /// Handles an incoming response. Drops duplicates and responses with
    /// no matching outgoing request; marks the matching request completed
    /// (further resends for this nonce will be no-ops) and delivers
    /// upstream exactly once (spec testable property 4).
    pub fn receive_response(
        &mut self,
        now: Instant,
        nonce: N,
        payload: P,
        policy: &ClassificationPolicy,
    ) -> Option<TransmissionEvent<P>> {
        if self.incoming_responses.contains_key(&nonce) {
            return None;
        }
        if !self.outgoing_requests.contains_key(&nonce) {
            log::debug!("transmission: response for unknown nonce, dropping");
            return None;
        }
        self.outgoing_requests.remove(&nonce);
        let _ = self.discard_at.add_nonce(now, policy.discard_after, nonce.clone(), None);
        self.incoming_responses.insert(nonce, IncomingResponseState);
        Some(TransmissionEvent::DeliverUpstream(payload))
    }

    /// Runs one resend tick for every outstanding outgoing request whose
    /// next scheduled delay has elapsed. A request whose matching response
    /// has already arrived is no longer in `outgoing_requests` (removed by
    /// [`Self::receive_response`]), so resend handlers for it are
    /// naturally no-ops — resends are "cancelled" by absence, not by an
    /// explicit flag.
    ///
    /// Once a request's schedule is exhausted it is quietly held (OQ2):
    /// no further resends are produced, but it stays registered until its
    /// discard time.
    pub fn tick_resends(&mut self, now: Instant) -> Vec<Message<P>> {
        let mut resends = Vec::new();
        for state in self.outgoing_requests.values_mut() {
            let elapsed = now.saturating_duration_since(state.sent_at);
            let due = state.schedule.resends_due(elapsed) as u32 + 1;
            if due > state.send_count {
                state.send_count = due;
                resends.push(Message::new(
                    Address::empty(),
                    state.endpoint.clone(),
                    state.message.clone(),
                ));
            }
        }
        resends
    }

    /// Evicts every nonce whose discard time has passed, across all four
    /// maps, and returns the timed-out outgoing requests as
    /// [`TransmissionEvent::RequestTimedOut`] (spec §7: protocol timeout
    /// is the one protocol failure surfaced to the originator).
    pub fn process(&mut self, now: Instant) -> Vec<TransmissionEvent<P>> {
        let mut timed_out = Vec::new();
        let before: Vec<N> = self
            .outgoing_requests
            .keys()
            .chain(self.outgoing_responses.keys())
            .chain(self.incoming_requests.keys())
            .chain(self.incoming_responses.keys())
            .cloned()
            .collect();
        self.discard_at.process(now);
        for nonce in before {
            if !self.discard_at.is_nonce_present(&nonce) {
                if let Some(state) = self.outgoing_requests.remove(&nonce) {
                    timed_out.push(TransmissionEvent::RequestTimedOut {
                        endpoint: state.endpoint,
                        payload: state.message,
                    });
                }
                self.outgoing_responses.remove(&nonce);
                self.incoming_requests.remove(&nonce);
                self.incoming_responses.remove(&nonce);
            }
        }
        timed_out
    }

    pub fn outgoing_request_count(&self) -> usize {
        self.outgoing_requests.len()
    }

    pub fn has_outgoing_request(&self, nonce: &N) -> bool {
        self.outgoing_requests.contains_key(nonce)
    }
}

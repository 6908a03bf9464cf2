//! The one-way delivery capability: a [`Shuttle`] accepts a batch of
//! messages addressed under the prefix it declares. Implementations never
//! block the caller indefinitely — backpressure, if any, is bounded and
//! stated by the implementation (see [`crate::bus::BackpressurePolicy`]).

use std::sync::Arc;

use async_trait::async_trait;
use log::warn;

use crate::address::Address;
use crate::bus::{Bus, BusError, BusRecord};
use crate::message::Message;

/// A one-way capability to deliver a batch of [`Message`]s under one prefix.
///
/// Implementations MUST reject or discard messages whose destination
/// element 0 does not equal [`Shuttle::prefix`].
#[async_trait]
pub trait Shuttle<P>: Send + Sync {
    /// The address prefix this shuttle accepts.
    fn prefix(&self) -> &Address;

    /// Submits a batch. Messages addressed outside `prefix()` are dropped
    /// (with a warning) rather than causing the call to fail.
    async fn submit(&self, batch: Vec<Message<P>>);
}

fn retain_in_prefix<P>(prefix: &Address, batch: Vec<Message<P>>) -> Vec<Message<P>> {
    batch
        .into_iter()
        .filter(|msg| match msg.destination.element(0) {
            Some(first) if prefix.element(0) == Some(first) => true,
            _ => {
                warn!(
                    "shuttle({prefix}): dropping message addressed to {dest}, outside prefix",
                    prefix = prefix,
                    dest = msg.destination
                );
                false
            }
        })
        .collect()
}

/// A Shuttle that pushes deliveries onto a [`Bus`] (used by gateways).
pub struct BusShuttle<P> {
    prefix: Address,
    bus: Arc<Bus<P>>,
}

impl<P> BusShuttle<P> {
    pub fn new(prefix: Address, bus: Arc<Bus<P>>) -> Self {
        BusShuttle { prefix, bus }
    }
}

#[async_trait]
impl<P: Send + Sync + 'static> Shuttle<P> for BusShuttle<P> {
    fn prefix(&self) -> &Address {
        &self.prefix
    }

    async fn submit(&self, batch: Vec<Message<P>>) {
        let batch = retain_in_prefix(&self.prefix, batch);
        if batch.is_empty() {
            return;
        }
        if let Err(BusError::Closed) = self.bus.push(BusRecord::Deliver(batch)).await {
            warn!("shuttle({}): bus closed, dropping batch", self.prefix);
        }
    }
}

/// A Shuttle that calls directly into a consumer (used by the actor host
/// for intra-host delivery, and by the simulator).
pub struct DirectShuttle<P> {
    prefix: Address,
    deliver: Arc<dyn Fn(Vec<Message<P>>) + Send + Sync>,
}

impl<P> DirectShuttle<P> {
    pub fn new(prefix: Address, deliver: Arc<dyn Fn(Vec<Message<P>>) + Send + Sync>) -> Self {
        DirectShuttle { prefix, deliver }
    }
}

#[async_trait]
impl<P: Send + Sync + 'static> Shuttle<P> for DirectShuttle<P> {
    fn prefix(&self) -> &Address {
        &self.prefix
    }

    async fn submit(&self, batch: Vec<Message<P>>) {
        let batch = retain_in_prefix(&self.prefix, batch);
        if !batch.is_empty() {
            (self.deliver)(batch);
        }
    }
}

/// A Shuttle that silently discards everything submitted to it.
pub struct NullShuttle<P> {
    prefix: Address,
    _marker: std::marker::PhantomData<P>,
}

impl<P> NullShuttle<P> {
    pub fn new(prefix: Address) -> Self {
        NullShuttle {
            prefix,
            _marker: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<P: Send + Sync + 'static> Shuttle<P> for NullShuttle<P> {
    fn prefix(&self) -> &Address {
        &self.prefix
    }

    async fn submit(&self, _batch: Vec<Message<P>>) {}
}

/// Adapts a non-actor, callback-shaped transport into the `Shuttle`
/// contract (Open Question 1: the actor-based model is first-class; raw
/// `Transport`-style collaborators plug in through this thin adapter).
pub struct LegacyTransportAdapter<P> {
    prefix: Address,
    send: Arc<dyn Fn(Vec<Message<P>>) + Send + Sync>,
}

impl<P> LegacyTransportAdapter<P> {
    pub fn new(prefix: Address, send: Arc<dyn Fn(Vec<Message<P>>) + Send + Sync>) -> Self {
        LegacyTransportAdapter { prefix, send }
    }
}

#[async_trait]
impl<P: Send + Sync + 'static> Shuttle<P> for LegacyTransportAdapter<P> {
    fn prefix(&self) -> &Address {
        &self.prefix
    }

    async fn submit(&self, batch: Vec<Message<P>>) {
        let batch = retain_in_prefix(&self.prefix, batch);
        if !batch.is_empty() {
            (self.send)(batch);
        }
    }
}

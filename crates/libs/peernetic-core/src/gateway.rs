//! A long-lived side component owning an incoming [`Shuttle`] and a
//! concurrent-safe map of outgoing shuttles. Lifecycle:
//! `create → getIncomingShuttle → (addOutgoingShuttle)* → … → close`.
//! `close` is idempotent; after it, `submit` on the incoming shuttle is a
//! no-op.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::address::Address;
use crate::bus::Bus;
use crate::message::Message;
use crate::shuttle::{BusShuttle, Shuttle};

/// A gateway: a bus-backed incoming shuttle plus a registry of outgoing
/// shuttles keyed by the prefix they serve.
pub struct Gateway<P> {
    prefix: Address,
    bus: Arc<Bus<P>>,
    outgoing: RwLock<HashMap<Address, Arc<dyn Shuttle<P>>>>,
}

impl<P: Send + Sync + 'static> Gateway<P> {
    pub fn new(prefix: Address) -> Self {
        Gateway {
            prefix,
            bus: Arc::new(Bus::unbounded()),
            outgoing: RwLock::new(HashMap::new()),
        }
    }

    /// The shuttle other components submit messages to; its prefix equals
    /// this gateway's prefix.
    pub fn incoming_shuttle(&self) -> Arc<dyn Shuttle<P>> {
        Arc::new(BusShuttle::new(self.prefix.clone(), self.bus.clone()))
    }

    /// Registers (or replaces) the outgoing shuttle serving `prefix`. May be
    /// called from any thread — the registry is concurrent-safe.
    pub async fn add_outgoing_shuttle(&self, prefix: Address, shuttle: Arc<dyn Shuttle<P>>) {
        self.outgoing.write().await.insert(prefix, shuttle);
    }

    pub async fn remove_outgoing_shuttle(&self, prefix: &Address) {
        self.outgoing.write().await.remove(prefix);
    }

    /// Submits `batch` to the outgoing shuttle registered for
    /// `destination`'s first element, dropping the batch if none is
    /// registered.
    pub async fn send(&self, destination: &Address, batch: Vec<Message<P>>) {
        let Some(first) = destination.element(0) else {
            return;
        };
        let Ok(first_addr) = Address::parse(first) else {
            return;
        };
        let target = self.outgoing.read().await.get(&first_addr).cloned();
        match target {
            Some(shuttle) => shuttle.submit(batch).await,
            None => log::warn!("gateway({}): no outgoing shuttle for {}", self.prefix, first),
        }
    }

    /// Drains the gateway's own inbound bus — the consumer side of its
    /// lifecycle, typically run in a dedicated worker.
    pub fn bus(&self) -> Arc<Bus<P>> {
        self.bus.clone()
    }

    pub fn prefix(&self) -> &Address {
        &self.prefix
    }

    /// Idempotent close; subsequent `submit`s on the incoming shuttle are
    /// no-ops because the underlying bus rejects pushes once closed.
    pub async fn close(&self) {
        self.bus.close().await;
    }
}

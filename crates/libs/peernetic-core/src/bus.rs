//! Multi-producer, single-consumer record queue backing a [`crate::gateway::Gateway`]
//! or [`crate::host::ActorHost`].
//!
//! Ordering is FIFO per producer. `drain` is batch-oriented: it returns as
//! soon as any record is present, or when `timeout` elapses, whichever
//! comes first. `close` is idempotent and wakes any pending drain.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};

use crate::address::Address;
use crate::message::Message;
use crate::shuttle::Shuttle;

/// A single entry in a [`Bus`].
pub enum BusRecord<P> {
    /// Register an outgoing shuttle under the prefix it serves.
    AddOutgoingShuttle(Address, Arc<dyn Shuttle<P>>),
    /// Deregister a previously-registered outgoing shuttle.
    RemoveOutgoingShuttle(Address),
    /// Deliver a batch of messages to the consumer's dispatch step.
    Deliver(Vec<Message<P>>),
    /// Shut the bus down. Idempotent; wakes any pending drain.
    Close,
}

/// Backpressure policy applied by a bounded [`Bus`] when full.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// Await capacity before appending.
    Block,
    /// Evict the oldest queued record to make room.
    DropOldest,
    /// Reject the push immediately.
    Fail,
}

/// Bounded-queue capacity and backpressure policy, chosen at construction.
#[derive(Clone, Copy, Debug)]
pub struct BusCapacity {
    pub max_records: usize,
    pub policy: BackpressurePolicy,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum BusError {
    #[error("bus is closed")]
    Closed,
    #[error("bus is full")]
    Full,
}

struct Inner<P> {
    queue: VecDeque<BusRecord<P>>,
    closed: bool,
}

/// A multi-producer, single-consumer queue of [`BusRecord`]s.
pub struct Bus<P> {
    inner: Mutex<Inner<P>>,
    notify: Notify,
    capacity: Option<BusCapacity>,
}

impl<P> Bus<P> {
    /// An unbounded bus: `push` never blocks and never fails except when closed.
    pub fn unbounded() -> Self {
        Bus {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
            capacity: None,
        }
    }

    /// A bounded bus applying `capacity`'s backpressure policy once full.
    pub fn bounded(capacity: BusCapacity) -> Self {
        Bus {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
            capacity: Some(capacity),
        }
    }

    /// Appends a record, applying this bus's backpressure policy if bounded.
    pub async fn push(&self, record: BusRecord<P>) -> Result<(), BusError> {
        loop {
            let mut guard = self.inner.lock().await;
            if guard.closed {
                return Err(BusError::Closed);
            }
            let Some(capacity) = self.capacity else {
                guard.queue.push_back(record);
                self.notify.notify_one();
                return Ok(());
            };
            if guard.queue.len() < capacity.max_records {
                guard.queue.push_back(record);
                self.notify.notify_one();
                return Ok(());
            }
            match capacity.policy {
                BackpressurePolicy::Fail => return Err(BusError::Full),
                BackpressurePolicy::DropOldest => {
                    guard.queue.pop_front();
                    guard.queue.push_back(record);
                    self.notify.notify_one();
                    return Ok(());
                }
                BackpressurePolicy::Block => {
                    drop(guard);
                    self.notify.notified().await;
                    // Re-check capacity/closed state on the next loop iteration.
                }
            }
        }
    }

    /// Drains up to `max_records` records, waiting up to `timeout` for the
    /// first one to arrive. Returns an empty batch on timeout.
    pub async fn drain(&self, max_records: usize, timeout: Duration) -> Vec<BusRecord<P>> {
        {
            let mut guard = self.inner.lock().await;
            if !guard.queue.is_empty() || guard.closed {
                return drain_locked(&mut guard.queue, max_records);
            }
        }
        let _ = tokio::time::timeout(timeout, self.notify.notified()).await;
        let mut guard = self.inner.lock().await;
        drain_locked(&mut guard.queue, max_records)
    }

    /// Idempotent shutdown. Wakes any task blocked in `drain` or `push`.
    pub async fn close(&self) {
        let mut guard = self.inner.lock().await;
        guard.closed = true;
        drop(guard);
        self.notify.notify_waiters();
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }
}

fn drain_locked<P>(queue: &mut VecDeque<BusRecord<P>>, max_records: usize) -> Vec<BusRecord<P>> {
    let n = queue.len().min(max_records.max(1));
    queue.drain(..n).collect()
}

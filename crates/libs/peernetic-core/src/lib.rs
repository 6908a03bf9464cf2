//! Addressing, shuttles, buses, gateways and the actor host — the wiring
//! fabric of the peernetic actor runtime.
//!
//! Everything in this crate is production-side: real tokio tasks drain
//! real buses. `peernetic-sim` drives the exact same [`Actor`] impls
//! through a deterministic virtual clock instead.

pub mod actor;
pub mod address;
pub mod bus;
pub mod gateway;
pub mod host;
pub mod message;
pub mod serializer;
pub mod shuttle;
pub mod subcoroutine;

pub use actor::{run_guarded, Actor, ActorContext, ActorStatus};
pub use address::{Address, AddressError};
pub use bus::{BackpressurePolicy, Bus, BusCapacity, BusError, BusRecord};
pub use gateway::Gateway;
pub use host::ActorHost;
pub use message::Message;
pub use serializer::{RmpSerializer, Serializer, SerializerError};
pub use shuttle::{BusShuttle, DirectShuttle, LegacyTransportAdapter, NullShuttle, Shuttle};
pub use subcoroutine::{AddBehavior, SubcoroutineError, SubcoroutineRouter};

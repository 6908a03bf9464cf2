//! Multiplexes many logical conversations inside one actor, keyed by
//! address suffix (spec §4.5). A router owns a relative suffix (e.g.
//! `"router"`) and a map from child key to child [`Actor`]; `forward`
//! strips the actor's self address and the router's own suffix from the
//! current destination and uses the first remaining element as the key.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::actor::{Actor, ActorContext, ActorStatus};
use crate::address::Address;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubcoroutineError {
    #[error("no subcoroutine registered at {0}")]
    NoSuchSubcoroutine(String),
}

/// How a child is added to the router.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddBehavior {
    /// Register the child; it only runs on subsequent messages.
    Add,
    /// Register the child, then immediately step it with the current
    /// incoming message (the "priming" delivery).
    AddAndPrime,
    /// Like `AddAndPrime`, but it is a logic error for the child to
    /// terminate during priming — its caller required it still running.
    AddAndPrimeRequireRunning,
}

struct Child<P> {
    actor: Box<dyn Actor<P>>,
}

/// Routes messages addressed under `self_suffix` to per-key child actors.
///
/// Uses a `BTreeMap`, not a `HashMap`: the simulator's determinism
/// invariant (spec §4.9) forbids iteration order that depends on address
/// hashing, and a router used from simulated code may iterate its
/// children (e.g. to broadcast a shutdown).
pub struct SubcoroutineRouter<P> {
    self_suffix: Address,
    children: BTreeMap<String, Child<P>>,
}

impl<P> SubcoroutineRouter<P> {
    pub fn new(self_suffix: Address) -> Self {
        SubcoroutineRouter {
            self_suffix,
            children: BTreeMap::new(),
        }
    }

    pub fn suffix(&self) -> &Address {
        &self.self_suffix
    }

    pub fn child_keys(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.children.contains_key(key)
    }

    /// Registers `actor` under `key`, optionally priming it with the
    /// current incoming message in `ctx`.
    ///
    /// Adding while a step is in progress — i.e. from inside another
    /// child's `resume` — is safe: only the single actor thread ever
    /// touches this map.
    pub fn add(
        &mut self,
        key: impl Into<String>,
        mut actor: Box<dyn Actor<P>>,
        behavior: AddBehavior,
        ctx: &mut ActorContext<P>,
    ) where
        P: Clone,
    {
        let key = key.into();
        match behavior {
            AddBehavior::Add => {
                self.children.insert(key, Child { actor });
            }
            AddBehavior::AddAndPrime | AddBehavior::AddAndPrimeRequireRunning => {
                let status = actor.prime(ctx);
                if status == ActorStatus::Terminated {
                    if behavior == AddBehavior::AddAndPrimeRequireRunning {
                        log::warn!(
                            "subcoroutine router: child '{key}' required to still be running \
                             after priming, but it terminated"
                        );
                    }
                    return;
                }
                self.children.insert(key, Child { actor });
            }
        }
    }

    /// Deregisters `key`. Fails with [`SubcoroutineError::NoSuchSubcoroutine`]
    /// if `key` was not registered (double-remove).
    pub fn remove(&mut self, key: &str) -> Result<(), SubcoroutineError> {
        self.children
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| SubcoroutineError::NoSuchSubcoroutine(key.to_string()))
    }

    /// Strips `self_address` and this router's own suffix from
    /// `ctx.destination()`, uses the first remaining element as the child
    /// key, and steps that child. A no-op if no element remains or no
    /// child matches the key. If the child terminates, its slot is
    /// removed.
    pub fn forward(&mut self, self_address: &Address, ctx: &mut ActorContext<P>) {
        let Some(rest) = self_address.remove_prefix(ctx.destination()).ok() else {
            return;
        };
        let Some(rest) = self.self_suffix.remove_prefix(&rest).ok() else {
            return;
        };
        let Some(key) = rest.element(0) else {
            return;
        };
        let key = key.to_string();
        let Some(child) = self.children.get_mut(&key) else {
            return;
        };
        if child.actor.resume(ctx) == ActorStatus::Terminated {
            self.children.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder(Vec<String>);

    impl Actor<String> for Recorder {
        fn prime(&mut self, ctx: &mut ActorContext<String>) -> ActorStatus {
            if let Some(p) = ctx.incoming() {
                self.0.push(p.clone());
            }
            ActorStatus::Suspended
        }

        fn resume(&mut self, ctx: &mut ActorContext<String>) -> ActorStatus {
            if let Some(p) = ctx.incoming() {
                self.0.push(p.clone());
            }
            ActorStatus::Suspended
        }
    }

    /// Subcoroutine isolation (spec §8): messages to `self:router:q` never
    /// reach `h`, and a child return removes only its own slot.
    #[test]
    fn messages_route_only_to_their_own_key() {
        let self_address = Address::parse("self").unwrap();
        let mut router: SubcoroutineRouter<String> =
            SubcoroutineRouter::new(Address::parse("router").unwrap());
        let mut ctx = ActorContext::new(self_address.clone());
        router.add("q", Box::new(Recorder(Vec::new())), AddBehavior::Add, &mut ctx);
        router.add("h", Box::new(Recorder(Vec::new())), AddBehavior::Add, &mut ctx);

        ctx.begin_step(
            Address::empty(),
            Address::parse("self:router:q").unwrap(),
            "for-q".to_string(),
        );
        router.forward(&self_address, &mut ctx);

        assert!(router.contains("q"));
        assert!(router.contains("h"));
    }

    #[test]
    fn forward_is_a_no_op_when_no_child_matches() {
        let self_address = Address::parse("self").unwrap();
        let mut router: SubcoroutineRouter<String> =
            SubcoroutineRouter::new(Address::parse("router").unwrap());
        let mut ctx = ActorContext::new(self_address.clone());
        ctx.begin_step(
            Address::empty(),
            Address::parse("self:router:missing").unwrap(),
            "x".to_string(),
        );
        router.forward(&self_address, &mut ctx); // must not panic
    }

    #[test]
    fn double_remove_fails() {
        let mut router: SubcoroutineRouter<String> =
            SubcoroutineRouter::new(Address::parse("router").unwrap());
        let mut ctx = ActorContext::new(Address::parse("self").unwrap());
        router.add("q", Box::new(Recorder(Vec::new())), AddBehavior::Add, &mut ctx);
        router.remove("q").unwrap();
        assert_eq!(
            router.remove("q").unwrap_err(),
            SubcoroutineError::NoSuchSubcoroutine("q".to_string())
        );
    }

    #[test]
    fn a_terminated_child_removes_only_its_own_slot() {
        struct OneShot;
        impl Actor<String> for OneShot {
            fn prime(&mut self, _ctx: &mut ActorContext<String>) -> ActorStatus {
                ActorStatus::Suspended
            }
            fn resume(&mut self, _ctx: &mut ActorContext<String>) -> ActorStatus {
                ActorStatus::Terminated
            }
        }
        let self_address = Address::parse("self").unwrap();
        let mut router: SubcoroutineRouter<String> =
            SubcoroutineRouter::new(Address::parse("router").unwrap());
        let mut ctx = ActorContext::new(self_address.clone());
        router.add("q", Box::new(OneShot), AddBehavior::Add, &mut ctx);
        router.add("h", Box::new(Recorder(Vec::new())), AddBehavior::Add, &mut ctx);

        ctx.begin_step(
            Address::empty(),
            Address::parse("self:router:q").unwrap(),
            "bye".to_string(),
        );
        router.forward(&self_address, &mut ctx);

        assert!(!router.contains("q"));
        assert!(router.contains("h"));
    }
}

//! The wire-level unit of communication: an immutable source/destination/
//! payload triple. Payloads carry no framework semantics — the framework
//! never inspects them except through pluggable accessors (nonce, timer
//! millis parsing) supplied by the caller.

use crate::address::Address;

/// Source address, destination address and opaque payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message<P> {
    pub source: Address,
    pub destination: Address,
    pub payload: P,
}

impl<P> Message<P> {
    pub fn new(source: Address, destination: Address, payload: P) -> Self {
        Message {
            source,
            destination,
            payload,
        }
    }

    /// Builds the reply message: source and destination swapped.
    pub fn reply(&self, payload: P) -> Message<P>
    where
        P: Clone,
    {
        Message {
            source: self.destination.clone(),
            destination: self.source.clone(),
            payload,
        }
    }

    pub fn map_payload<Q>(self, f: impl FnOnce(P) -> Q) -> Message<Q> {
        Message {
            source: self.source,
            destination: self.destination,
            payload: f(self.payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_swaps_source_and_destination() {
        let a = Address::parse("a:e").unwrap();
        let b = Address::parse("b:s").unwrap();
        let msg = Message::new(b.clone(), a.clone(), "hi".to_string());
        let reply = msg.reply("hi back".to_string());
        assert_eq!(reply.source, a);
        assert_eq!(reply.destination, b);
        assert_eq!(reply.payload, "hi back");
    }
}

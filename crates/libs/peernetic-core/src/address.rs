//! Hierarchical addressing and prefix algebra.
//!
//! An [`Address`] is an ordered, non-empty-element sequence used to route
//! [`crate::message::Message`]s between actors, gateways and hosts. Two
//! addresses are equal iff their element sequences are equal; the empty
//! address is the sentinel "no destination".

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by address construction and prefix operations.
///
/// Raised synchronously to the caller — an address error never crosses an
/// actor boundary (see spec §7, "Validation").
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum AddressError {
    #[error("address element at index {index} is empty")]
    MalformedAddress { index: usize },
    #[error("{prefix} is not a prefix of {of}")]
    NotAPrefix { prefix: String, of: String },
}

/// An immutable, ordered sequence of non-empty string elements.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(Vec<String>);

impl Address {
    /// The empty address — the sentinel "no destination".
    pub fn empty() -> Self {
        Address(Vec::new())
    }

    /// Builds an address from an already-validated element sequence.
    pub fn from_elements<I, S>(elements: I) -> Result<Self, AddressError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let elements: Vec<String> = elements.into_iter().map(Into::into).collect();
        for (index, element) in elements.iter().enumerate() {
            if element.is_empty() {
                return Err(AddressError::MalformedAddress { index });
            }
        }
        Ok(Address(elements))
    }

    /// Parses a `:`-joined address string, e.g. `"sender:proxy:echoer"`.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        if s.is_empty() {
            return Ok(Address::empty());
        }
        Self::from_elements(s.split(':'))
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Element at `index`, if present.
    pub fn element(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn elements(&self) -> &[String] {
        &self.0
    }

    /// Returns a new address with `suffix`'s elements appended.
    pub fn append(&self, suffix: &Address) -> Address {
        let mut elements = self.0.clone();
        elements.extend(suffix.0.iter().cloned());
        Address(elements)
    }

    /// `true` iff `self` is a (proper or equal) initial subsequence of `other`.
    pub fn is_prefix_of(&self, other: &Address) -> bool {
        self.0.len() <= other.0.len() && self.0 == other.0[..self.0.len()]
    }

    /// Returns `other`'s elements with `self`'s prefix removed.
    ///
    /// Fails with [`AddressError::NotAPrefix`] if `self` is not a prefix of
    /// `other`.
    pub fn remove_prefix(&self, other: &Address) -> Result<Address, AddressError> {
        if !self.is_prefix_of(other) {
            return Err(AddressError::NotAPrefix {
                prefix: self.to_string(),
                of: other.to_string(),
            });
        }
        Ok(Address(other.0[self.0.len()..].to_vec()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(":"))
    }
}

impl std::str::FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

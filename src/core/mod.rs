//! # Core Module
//!
//! The `core` module contains the main components of the SWIM protocol implementation.
//! The protocol itself is a synchronous state machine built from the membership table,
//! the selection policies and the merge engine. The node actor drives it over a
//! transport abstraction and publishes its effects.
pub(crate) mod event;
pub(crate) mod member;
pub(crate) mod merge;
mod message;
pub(crate) mod node;
pub(crate) mod peer;
pub(crate) mod protocol;
pub(crate) mod runtime;
pub(crate) mod selection;
pub(crate) mod transport;
mod utils;
pub(crate) mod view;

//! Functional core for brokerrp.
//!
//! Everything in here is independent of the HTTP substrate: callback
//! parameter handling, token endpoint replies, outcome events and the
//! `/verify` state machine that ties them together.

pub mod rp;

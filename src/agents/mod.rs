//! Agents shipped with the bridge.
//!
//! Each module exposes its agent `NAME` and a `build` factory matching
//! [`AgentFactory`](crate::agent::AgentFactory).

pub mod bye;
pub mod hello;

//! services/juris/src/lib.rs
//!
//! The `juris` service: backend adapters, the AI gateway and the drafting
//! workflows built on them.

pub mod adapters;
pub mod ai;
pub mod backend;
pub mod config;
pub mod error;
pub mod state;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

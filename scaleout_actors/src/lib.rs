//! Coordination for a fleet of iterative workers. A master broadcasts shared state in rounds,
//! workers compute a contribution each round, and the master merges the contributions back
//! into the next round's state.
//!
//! The pieces, bottom up:
//! - [`core`]: the actor runtime everything runs on.
//! - [`cluster`]: gossip membership, which workers join to reach the master.
//! - [`pubsub`]: the topic mediator carrying control messages.
//! - [`tracker`]: the ledger of available workers.
//! - [`coordination`]: the master and worker coordinators, and worker supervision.
//! - [`testkit`]: delivery failure injection and log setup for tests.

pub mod cluster;
pub mod coordination;
pub mod core;
pub mod error;
pub mod pubsub;
pub mod testkit;
pub mod tracker;

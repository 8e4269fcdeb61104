//! The actor runtime every coordinator runs on: spawning actors, typed local references and
//! timers.
//!
//! ### Actors
//! An actor is a value implementing [`Actor`] for its message type. It is spawned on a
//! [`Node`], which runs it as a single tokio task with an unbounded mailbox. Messages are
//! processed one at a time, so an actor never needs locks for its own state. Actors interact
//! only by sending each other messages.
//!
//! ```ignore
//! struct Counter(u64);
//!
//! #[async_trait]
//! impl Actor<u64> for Counter {
//!   async fn recv(&mut self, _: &ActorContext<u64>, msg: u64) {
//!     self.0 += msg;
//!   }
//! }
//!
//! let node = Node::new("scaleout://fleet@127.0.0.1:2552".parse()?);
//! let counter = node.spawn(Counter(0), "counter".to_string());
//! counter.send(5);
//! counter.signal(ActorSignal::Term);
//! ```
//!
//! ### Local References
//! A [`LocalRef`] is a cheap, cloneable handle that accepts a single message type. An actor with
//! an enum message type can hand out references to any of its variants' payloads with
//! [`ActorContext::local_interface`], as long as the enum implements `From` for the payload.
//! Sending returns `false` once the receiving actor is gone; holders use that to prune dead
//! subscribers.

mod actor;
mod actor_ref;
mod actor_tasks;
mod address;
mod node;

#[rustfmt::skip]
pub(in crate::core) use {
  actor::local_actor_msg_convert,
  actor_tasks::run_single,
};

#[rustfmt::skip]
pub use {
  actor::Actor,
  actor::ActorContext,
  actor::ActorSignal,
  actor::LocalActorMsg,
  actor_ref::LocalRef,
  actor_ref::SubscriptionId,
  address::Address,
  node::Node,
};

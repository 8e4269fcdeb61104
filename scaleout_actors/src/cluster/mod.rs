//! Gossip-based cluster membership.
//!
//! Every [`Node`](crate::core::Node) that takes part in a fleet runs one [`Cluster`] instance.
//! The instance keeps a [`Gossip`] table of members and their [`MachineState`]; tables are
//! merged pairwise, and a `Down` state always wins over `Up` for the same member. A member that
//! rejoins after being downed does so under a new identifier, so it never collides with its
//! old entry.
//!
//! Instances find each other through a [`ClusterNetwork`], the table of which addresses are
//! currently listening. Joining an address nobody listens on fails with
//! [`JoinError::Unreachable`](crate::error::JoinError::Unreachable).
//!
//! Local actors subscribe to a [`Cluster`] to receive [`ClusterEvent`]s. A new subscriber first
//! receives a `MemberUp` for every member already up, then every change as it is learned.
//!
//! There is no failure detector here. Members leave on their own ([`Cluster::leave`]) or are
//! marked down by someone else ([`Cluster::down`]).

mod cluster;
mod gossip;
mod network;
mod utils;

#[rustfmt::skip]
pub use {
  cluster::Cluster,
  gossip::Gossip,
  gossip::MachineState,
  network::ClusterNetwork,
  utils::ClusterEvent,
  utils::Member,
};

#[rustfmt::skip]
#[doc(hidden)]
pub use {
  cluster::ClusterCmd,
  cluster::ClusterMsg,
  cluster::IntraClusterMsg,
};

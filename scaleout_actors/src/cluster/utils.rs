use crate::core::Address;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;

/// Represents a member of a cluster.
#[derive(
  Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Member {
  /// Where this member's [`Cluster`](crate::cluster::Cluster) instance listens.
  pub address: Address,
  /// Differentiates between the times the same address has joined the cluster.
  pub id: u64,
}
impl Display for Member {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}#{:x}", self.address, self.id)
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClusterEvent {
  MemberUp(Arc<Member>),
  MemberRemoved(Arc<Member>),
}

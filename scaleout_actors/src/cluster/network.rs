use crate::cluster::IntraClusterMsg;
use crate::core::{Address, LocalRef};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// The addresses cluster instances currently listen on, shared by every instance that should be
/// able to reach the others.
#[derive(Clone, Default)]
pub struct ClusterNetwork {
  listeners: Arc<Mutex<HashMap<Address, LocalRef<IntraClusterMsg>>>>,
}
impl ClusterNetwork {
  pub fn new() -> ClusterNetwork {
    Self::default()
  }

  pub(in crate::cluster) fn bind(
    &self,
    address: Address,
    recvr: LocalRef<IntraClusterMsg>,
  ) {
    self
      .listeners
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(address, recvr);
  }

  pub(in crate::cluster) fn unbind(&self, address: &Address) {
    self
      .listeners
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(address);
  }

  pub(in crate::cluster) fn lookup(
    &self,
    address: &Address,
  ) -> Option<LocalRef<IntraClusterMsg>> {
    self
      .listeners
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(address)
      .cloned()
  }

  /// Delivers to the instance at `address`. A listener whose actor has died is unbound.
  pub(in crate::cluster) fn send(
    &self,
    address: &Address,
    msg: IntraClusterMsg,
  ) -> bool {
    match self.lookup(address) {
      Some(r) if r.send(msg) => true,
      Some(_) => {
        self.unbind(address);
        false
      }
      None => false,
    }
  }

  pub fn is_listening(&self, address: &Address) -> bool {
    self.lookup(address).is_some()
  }
}

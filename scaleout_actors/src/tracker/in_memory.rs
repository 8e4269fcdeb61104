use crate::coordination::WorkerId;
use crate::error::TrackerError;
use crate::tracker::StateTracker;
use async_trait::async_trait;
use hashbrown::HashMap;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Default)]
struct Ledger {
  /// When each identity last marked itself available.
  entries: HashMap<WorkerId, Instant>,
  shut_down: bool,
}

/// A ledger held in this process's memory.
#[derive(Default)]
pub struct InMemoryStateTracker {
  ledger: RwLock<Ledger>,
}
impl InMemoryStateTracker {
  pub fn new() -> InMemoryStateTracker {
    Self::default()
  }

  /// Tears the ledger down. Every later call fails with [`TrackerError::ShutDown`].
  pub async fn shutdown(&self) {
    let mut ledger = self.ledger.write().await;
    ledger.shut_down = true;
    ledger.entries.clear();
    info!("state tracker shut down");
  }

  pub async fn last_seen(&self, id: &WorkerId) -> Option<Instant> {
    self.ledger.read().await.entries.get(id).copied()
  }
}
#[async_trait]
impl StateTracker for InMemoryStateTracker {
  async fn mark_available(&self, id: &WorkerId) -> Result<(), TrackerError> {
    let mut ledger = self.ledger.write().await;
    if ledger.shut_down {
      return Err(TrackerError::ShutDown);
    }
    if ledger.entries.insert(*id, Instant::now()).is_none() {
      debug!(worker = %id, "available for work");
    }
    Ok(())
  }

  async fn remove_worker(&self, id: &WorkerId) -> Result<(), TrackerError> {
    let mut ledger = self.ledger.write().await;
    if ledger.shut_down {
      return Err(TrackerError::ShutDown);
    }
    match ledger.entries.remove(id) {
      Some(_) => {
        debug!(worker = %id, "no longer available");
        Ok(())
      }
      None => Err(TrackerError::NotRegistered(*id)),
    }
  }

  async fn list_available(&self) -> Result<im::HashSet<WorkerId>, TrackerError> {
    let ledger = self.ledger.read().await;
    if ledger.shut_down {
      return Err(TrackerError::ShutDown);
    }
    Ok(ledger.entries.keys().copied().collect())
  }
}

#[cfg(test)]
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_ledger_register_remove() {
  let tracker = InMemoryStateTracker::new();
  let a = WorkerId::generate();
  let b = WorkerId::generate();
  assert_ok!(tracker.mark_available(&a).await);
  assert_ok!(tracker.mark_available(&a).await);
  assert_ok!(tracker.mark_available(&b).await);
  assert_eq!(tracker.list_available().await, Ok(im::hashset![a, b]));
  assert_ok!(tracker.remove_worker(&a).await);
  assert_eq!(
    tracker.remove_worker(&a).await,
    Err(TrackerError::NotRegistered(a))
  );
  assert_eq!(tracker.is_available(&a).await, Ok(false));
  assert_eq!(tracker.is_available(&b).await, Ok(true));
}

#[tokio::test]
async fn test_ledger_shutdown() {
  let tracker = InMemoryStateTracker::new();
  let a = WorkerId::generate();
  assert_ok!(tracker.mark_available(&a).await);
  tracker.shutdown().await;
  assert_err!(tracker.list_available().await);
  assert_eq!(tracker.remove_worker(&a).await, Err(TrackerError::ShutDown));
  assert_eq!(tracker.last_seen(&a).await, None);
}

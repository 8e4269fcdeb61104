use crate::coordination::WorkerId;
use crate::error::TrackerError;
use crate::tracker::{SharedTracker, StateTracker};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// One identity's "available for work" entry, held for as long as the worker instance runs.
///
/// [`release`](Registration::release) removes the entry. If the guard is dropped without being
/// released, for instance because the worker's task was torn down by a panic, the removal is
/// spawned onto the current runtime instead. Either way the entry is removed at most once by
/// its holder.
pub struct Registration {
  id: Option<WorkerId>,
  tracker: SharedTracker,
}
impl Registration {
  pub async fn acquire(
    tracker: SharedTracker,
    id: WorkerId,
  ) -> Result<Registration, TrackerError> {
    tracker.mark_available(&id).await?;
    Ok(Registration {
      id: Some(id),
      tracker: tracker,
    })
  }

  pub async fn release(mut self) {
    if let Some(id) = self.id.take() {
      remove(&*self.tracker, &id).await;
    }
  }
}
impl Drop for Registration {
  fn drop(&mut self) {
    if let Some(id) = self.id.take() {
      let tracker = self.tracker.clone();
      match Handle::try_current() {
        Ok(rt) => {
          rt.spawn(async move { remove(&*tracker, &id).await });
        }
        Err(_) => warn!(worker = %id, "no runtime left to deregister on"),
      }
    }
  }
}

/// Stale removals (entry already gone, tracker torn down) are expected during shutdown races
/// and are only logged.
async fn remove(tracker: &dyn StateTracker, id: &WorkerId) {
  match tracker.remove_worker(id).await {
    Ok(()) => debug!(worker = %id, "deregistered"),
    Err(e) => info!(worker = %id, error = %e, "already deregistered"),
  }
}

#[cfg(test)]
use crate::tracker::InMemoryStateTracker;
#[cfg(test)]
use std::sync::Arc;

#[tokio::test]
async fn test_registration_release() {
  let tracker = Arc::new(InMemoryStateTracker::new());
  let id = WorkerId::generate();
  let reg = Registration::acquire(tracker.clone(), id).await.unwrap();
  assert_eq!(tracker.is_available(&id).await, Ok(true));
  reg.release().await;
  assert_eq!(tracker.is_available(&id).await, Ok(false));
}

#[tokio::test]
async fn test_registration_drop_releases() {
  let tracker = Arc::new(InMemoryStateTracker::new());
  let id = WorkerId::generate();
  let reg = Registration::acquire(tracker.clone(), id).await.unwrap();
  drop(reg);
  for _ in 0..100 {
    if tracker.is_available(&id).await == Ok(false) {
      return;
    }
    tokio::task::yield_now().await;
  }
  panic!("dropped registration was never released");
}

#[tokio::test]
async fn test_registration_release_after_teardown() {
  let tracker = Arc::new(InMemoryStateTracker::new());
  let id = WorkerId::generate();
  let reg = Registration::acquire(tracker.clone(), id).await.unwrap();
  tracker.shutdown().await;
  reg.release().await;
}

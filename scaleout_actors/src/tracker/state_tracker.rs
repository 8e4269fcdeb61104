use crate::coordination::WorkerId;
use crate::error::TrackerError;
use async_trait::async_trait;
use std::sync::Arc;

/// Every operation must be safe to call concurrently from many workers, and may be retried:
/// marking an identity that is already available only refreshes it.
#[async_trait]
pub trait StateTracker: Send + Sync + 'static {
  async fn mark_available(&self, id: &WorkerId) -> Result<(), TrackerError>;

  /// Fails with [`TrackerError::NotRegistered`] if `id` is not in the ledger.
  async fn remove_worker(&self, id: &WorkerId) -> Result<(), TrackerError>;

  async fn list_available(&self) -> Result<im::HashSet<WorkerId>, TrackerError>;

  async fn is_available(&self, id: &WorkerId) -> Result<bool, TrackerError> {
    Ok(self.list_available().await?.contains(id))
  }
}

pub type SharedTracker = Arc<dyn StateTracker>;

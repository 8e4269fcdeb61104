use crate::coordination::{Conf, Updateable};
use crate::error::ComputeFailure;

/// The algorithm a worker runs. Implementations only compute; registration, subscriptions and
/// restarts are handled by the coordination harness that drives them.
///
/// Every method is called from one task at a time. `compute` runs on the blocking pool, so it
/// may take a while, but each call must finish.
pub trait Worker: Send + 'static {
  type Result: Updateable;

  /// Applies the configuration. Called once per instance, before it joins the fleet.
  fn setup(&mut self, _conf: &Conf) {}

  /// Produces this round's contribution.
  fn compute(&mut self) -> Result<Self::Result, ComputeFailure>;

  /// Records are ignored; this is the same as [`compute`](Worker::compute).
  fn compute_records(
    &mut self,
    _records: Vec<Self::Result>,
  ) -> Result<Self::Result, ComputeFailure> {
    self.compute()
  }

  /// Takes in the master's latest merged state.
  fn update(&mut self, e: Self::Result);

  fn get_e(&self) -> &Self::Result;

  /// The last result this worker computed, if it keeps one.
  fn results(&self) -> Option<&Self::Result> {
    None
  }

  /// Whether the local iteration counter advanced with the last compute, e.g. because an epoch
  /// finished.
  fn increment_iteration(&mut self) -> bool {
    false
  }

  /// Called after a compute failure, before the instance is discarded.
  fn on_failure(&mut self, _cause: &ComputeFailure) {}
}

#[cfg(test)]
use crate::coordination::Total;

#[cfg(test)]
struct Counter {
  calls: i64,
  e: Total,
}
#[cfg(test)]
impl Worker for Counter {
  type Result = Total;

  fn compute(&mut self) -> Result<Total, ComputeFailure> {
    self.calls += 1;
    Ok(Total::of(self.calls))
  }

  fn update(&mut self, e: Total) {
    self.e = e;
  }

  fn get_e(&self) -> &Total {
    &self.e
  }
}

#[test]
fn test_worker_defaults() {
  let mut w = Counter {
    calls: 0,
    e: Total::default(),
  };
  w.setup(&Conf::default());
  assert_eq!(w.compute(), Ok(Total::of(1)));
  assert_eq!(w.compute_records(vec![Total::of(100)]), Ok(Total::of(2)));
  assert!(!w.increment_iteration());
  assert_eq!(w.results(), None);
  w.update(Total::of(9));
  assert_eq!(w.get_e(), &Total::of(9));
}

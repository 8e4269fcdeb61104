use crate::core::Address;
use crate::pubsub::Topic;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identifies one worker instance for one registration lifetime. Never reused: a restarted
/// worker mints a new one.
#[derive(
  Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct WorkerId(u128);
impl WorkerId {
  pub fn generate() -> WorkerId {
    WorkerId(rand::random())
  }
}
impl Display for WorkerId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{:032x}", self.0)
  }
}

/// A worker's registration record, announced once on `MASTER`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerState {
  pub identity: WorkerId,
  /// The cluster address of the node hosting the worker.
  pub node: Address,
}

/// The merged state the master hands out to start a round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundStart<E> {
  pub round: u64,
  pub state: E,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundResult<E> {
  pub round: u64,
  pub worker: WorkerId,
  pub result: E,
}

/// Everything that travels over the control topics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ControlMsg<E> {
  Register(WorkerState),
  ClearWorker(WorkerId),
  Result(RoundResult<E>),
  Round(RoundStart<E>),
  /// The master gave up on this worker. Sent to the worker itself.
  Evicted(WorkerId),
  Shutdown,
}
impl<E> ControlMsg<E> {
  /// The topic this message belongs on.
  pub fn topic(&self) -> Topic {
    match self {
      ControlMsg::Register(_)
      | ControlMsg::ClearWorker(_)
      | ControlMsg::Result(_) => Topic::Master,
      ControlMsg::Round(_) | ControlMsg::Evicted(_) => Topic::Broadcast,
      ControlMsg::Shutdown => Topic::Shutdown,
    }
  }
}

#[test]
fn test_worker_ids_unique() {
  let ids = (0..1000).map(|_| WorkerId::generate()).collect::<std::collections::HashSet<_>>();
  assert_eq!(ids.len(), 1000);
  let id = WorkerId(0xabc);
  assert_eq!(id.to_string(), "00000000000000000000000000000abc");
}

#[test]
fn test_control_topics() {
  let id = WorkerId::generate();
  let result = ControlMsg::Result(RoundResult {
    round: 1,
    worker: id,
    result: 3u8,
  });
  assert_eq!(result.topic(), Topic::Master);
  assert_eq!(ControlMsg::<u8>::ClearWorker(id).topic(), Topic::Master);
  let round = ControlMsg::Round(RoundStart { round: 2, state: 0u8 });
  assert_eq!(round.topic(), Topic::Broadcast);
  assert_eq!(ControlMsg::<u8>::Evicted(id).topic(), Topic::Broadcast);
  assert_eq!(ControlMsg::<u8>::Shutdown.topic(), Topic::Shutdown);
}

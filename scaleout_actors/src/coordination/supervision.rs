use crate::coordination::WorkerId;
use crate::error::ComputeFailure;

/// Where a supervised worker is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerPhase {
  Running,
  Failed,
  /// Bringing up a new instance. A supervisor starts here; its first start is not counted as
  /// a restart.
  Restarting,
  Stopped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerEvent {
  Started,
  Failure(ComputeFailure),
  Directed(Directive),
  Stop,
}

/// What the supervising policy wants done with a failed worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Directive {
  Restart,
  Stop,
}

impl WorkerPhase {
  pub fn on(self, event: &WorkerEvent) -> WorkerPhase {
    use WorkerEvent::*;
    use WorkerPhase::*;
    match (self, event) {
      (Stopped, _) | (_, Stop) => Stopped,
      (Running, Failure(_)) => Failed,
      (Failed, Directed(Directive::Restart)) => Restarting,
      (Failed, Directed(Directive::Stop)) => Stopped,
      (Restarting, Started) => Running,
      (phase, _) => phase,
    }
  }
}

pub trait SupervisionPolicy: Send + 'static {
  fn decide(&mut self, worker: &WorkerId, cause: &ComputeFailure) -> Directive;
}
impl<F> SupervisionPolicy for F
where
  F: FnMut(&WorkerId, &ComputeFailure) -> Directive + Send + 'static,
{
  fn decide(&mut self, worker: &WorkerId, cause: &ComputeFailure) -> Directive {
    self(worker, cause)
  }
}

/// Restarts every failure immediately, forever.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysRestart;
impl SupervisionPolicy for AlwaysRestart {
  fn decide(&mut self, _: &WorkerId, _: &ComputeFailure) -> Directive {
    Directive::Restart
  }
}

/// What a supervisor publishes about its worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupervisorStatus {
  pub phase: WorkerPhase,
  /// The running instance's identity, once one has started.
  pub identity: Option<WorkerId>,
  pub restarts: u64,
  pub last_failure: Option<ComputeFailure>,
}
impl Default for SupervisorStatus {
  fn default() -> Self {
    SupervisorStatus {
      phase: WorkerPhase::Restarting,
      identity: None,
      restarts: 0,
      last_failure: None,
    }
  }
}

#[test]
fn test_phase_transitions() {
  use WorkerPhase::*;
  let cause = ComputeFailure::Failed("nan loss".to_string());
  let restart = WorkerEvent::Directed(Directive::Restart);
  let phase = Restarting.on(&WorkerEvent::Started);
  assert_eq!(phase, Running);
  let phase = phase.on(&WorkerEvent::Failure(cause.clone()));
  assert_eq!(phase, Failed);
  let phase = phase.on(&restart);
  assert_eq!(phase, Restarting);
  assert_eq!(phase.on(&WorkerEvent::Started), Running);
  assert_eq!(Failed.on(&WorkerEvent::Directed(Directive::Stop)), Stopped);
  assert_eq!(Running.on(&restart), Running);
  assert_eq!(Running.on(&WorkerEvent::Stop), Stopped);
  assert_eq!(Stopped.on(&WorkerEvent::Started), Stopped);
  assert_eq!(Stopped.on(&WorkerEvent::Failure(cause)), Stopped);
}

#[test]
fn test_always_restart() {
  let id = WorkerId::generate();
  let mut policy = AlwaysRestart;
  for i in 0..10 {
    let cause = ComputeFailure::Failed(format!("failure {}", i));
    assert_eq!(policy.decide(&id, &cause), Directive::Restart);
  }
}

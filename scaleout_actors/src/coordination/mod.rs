//! Round-based coordination of a worker fleet.
//!
//! A [`MasterCoordinator`] runs rounds. Each round it broadcasts its current state, waits for
//! exactly one result from every worker it expects, merges them with [`Updateable::merge`] and
//! starts the next round. Workers that miss the round deadline are evicted. Workers that
//! register while a round is open join at the next one.
//!
//! A worker process calls [`launch_worker`] with a factory for its [`Worker`] and a
//! [`SupervisionPolicy`]. Each worker instance joins the master's cluster, subscribes to the
//! `BROADCAST` and `SHUTDOWN` topics, announces itself on `MASTER` and marks itself available
//! in the [`StateTracker`](crate::tracker::StateTracker). When the instance fails, its
//! supervisor clears it from the master and, if the policy says so, starts a new instance under
//! a new identity. However an instance ends, its ledger entry is removed.
//!
//! All control traffic is a [`ControlMsg`], and may arrive more than once. The master and the
//! workers both ignore duplicates.

mod conf;
mod master;
mod messages;
mod supervision;
mod supervisor;
mod updateable;
mod worker;
mod worker_coordinator;

#[rustfmt::skip]
pub(in crate::coordination) use {
  supervisor::SupervisorMsg,
  worker_coordinator::WorkerCoordinator,
  worker_coordinator::WorkerMsg,
};

#[rustfmt::skip]
pub use {
  conf::Conf,
  conf::MasterConfig,
  master::MasterCoordinator,
  master::MasterHandle,
  master::MasterSnapshot,
  master::RoundOutcome,
  messages::ControlMsg,
  messages::RoundResult,
  messages::RoundStart,
  messages::WorkerId,
  messages::WorkerState,
  supervision::AlwaysRestart,
  supervision::Directive,
  supervision::SupervisionPolicy,
  supervision::SupervisorStatus,
  supervision::WorkerEvent,
  supervision::WorkerPhase,
  supervisor::launch_worker,
  supervisor::WorkerHandle,
  updateable::Tally,
  updateable::Total,
  updateable::Updateable,
  worker::Worker,
  worker_coordinator::WorkerEnv,
};

#[rustfmt::skip]
#[doc(hidden)]
pub use {
  master::MasterCmd,
  master::MasterMsg,
};

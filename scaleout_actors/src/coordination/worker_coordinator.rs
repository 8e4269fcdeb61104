use crate::cluster::{Cluster, ClusterEvent};
use crate::coordination::{
  Conf, ControlMsg, RoundResult, RoundStart, SupervisorMsg, Worker, WorkerId,
  WorkerState,
};
use crate::core::{Actor, ActorContext, Address, LocalRef, Node, SubscriptionId};
use crate::error::{ComputeFailure, JoinError};
use crate::pubsub::{Mediator, Topic};
use crate::tracker::{Registration, SharedTracker};
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

pub enum WorkerMsg<E: Send + 'static> {
  Control(ControlMsg<E>),
  Membership(ClusterEvent),
}
impl<E: Send + 'static> From<ControlMsg<E>> for WorkerMsg<E> {
  fn from(msg: ControlMsg<E>) -> Self {
    WorkerMsg::Control(msg)
  }
}
impl<E: Send + 'static> From<ClusterEvent> for WorkerMsg<E> {
  fn from(event: ClusterEvent) -> Self {
    WorkerMsg::Membership(event)
  }
}

/// What a worker process shares with the rest of the fleet. Every instance a supervisor starts
/// gets the same environment.
pub struct WorkerEnv<E: Send + 'static> {
  /// This process's membership handle.
  pub cluster: Cluster,
  pub mediator: Mediator<ControlMsg<E>>,
  pub tracker: SharedTracker,
  /// If set, results go straight to the master instead of over `MASTER`.
  pub master: Option<LocalRef<ControlMsg<E>>>,
}
impl<E: Send + 'static> Clone for WorkerEnv<E> {
  fn clone(&self) -> Self {
    WorkerEnv {
      cluster: self.cluster.clone(),
      mediator: self.mediator.clone(),
      tracker: self.tracker.clone(),
      master: self.master.clone(),
    }
  }
}

/// Drives one instance of a [`Worker`] through rounds. Failures are handed to the supervisor,
/// which decides what comes next; this instance never survives one.
pub(in crate::coordination) struct WorkerCoordinator<W: Worker> {
  identity: WorkerId,
  worker: Option<W>,
  env: WorkerEnv<W::Result>,
  master_node: Option<Address>,
  master_path: String,
  supervisor: LocalRef<SupervisorMsg>,
  registration: Option<Registration>,
  subscriptions: Vec<(Topic, SubscriptionId)>,
  membership: Option<SubscriptionId>,
  last_round: Option<u64>,
}
impl<W: Worker> WorkerCoordinator<W> {
  /// Configures the worker, joins the cluster and spawns the instance under a fresh identity.
  /// The instance subscribes, announces itself and registers as soon as it runs.
  pub(in crate::coordination) async fn start(
    mut worker: W,
    conf: &Conf,
    env: &WorkerEnv<W::Result>,
    supervisor: LocalRef<SupervisorMsg>,
    node: &Node,
  ) -> Result<(WorkerId, LocalRef<WorkerMsg<W::Result>>, JoinHandle<()>), JoinError>
  {
    worker.setup(conf);
    env.cluster.join(&conf.master_url).await?;
    let identity = WorkerId::generate();
    let coordinator = WorkerCoordinator {
      identity: identity,
      worker: Some(worker),
      env: env.clone(),
      master_node: conf.master_address().ok(),
      master_path: conf.master_abs_path.clone(),
      supervisor: supervisor,
      registration: None,
      subscriptions: Vec::new(),
      membership: None,
      last_round: None,
    };
    let (actor, handle) =
      node.spawn_watched(coordinator, format!("worker-{}", identity));
    Ok((identity, actor, handle))
  }

  async fn run_round(
    &mut self,
    ctx: &ActorContext<WorkerMsg<W::Result>>,
    start: RoundStart<W::Result>,
  ) {
    let RoundStart { round, state } = start;
    if self.last_round.map_or(false, |last| round <= last) {
      trace!(worker = %self.identity, round = round, "already computed this round");
      return;
    }
    let mut worker = match self.worker.take() {
      Some(w) => w,
      None => return,
    };
    self.last_round = Some(round);
    worker.update(state);
    let computed = tokio::task::spawn_blocking(move || {
      let result = worker.compute();
      let advanced = result.is_ok() && worker.increment_iteration();
      (worker, result, advanced)
    })
    .await;
    match computed {
      Ok((worker, Ok(result), advanced)) => {
        self.worker = Some(worker);
        if advanced {
          debug!(worker = %self.identity, round = round, "local iteration advanced");
        }
        self.report(RoundResult {
          round: round,
          worker: self.identity,
          result: result,
        });
      }
      Ok((mut worker, Err(cause), _)) => {
        worker.on_failure(&cause);
        self.fail(ctx, cause);
      }
      Err(e) => self.fail(ctx, ComputeFailure::Panicked(e.to_string())),
    }
  }

  fn report(&self, result: RoundResult<W::Result>) {
    let round = result.round;
    let msg = ControlMsg::Result(result);
    match &self.env.master {
      Some(master) => {
        if !master.send(msg) {
          warn!(worker = %self.identity, round = round, "master client is gone, result lost");
        }
      }
      None => {
        self.env.mediator.publish(msg.topic(), msg);
      }
    }
  }

  fn fail(
    &mut self,
    ctx: &ActorContext<WorkerMsg<W::Result>>,
    cause: ComputeFailure,
  ) {
    error!(worker = %self.identity, error = %cause, "compute step failed");
    self.supervisor.send(SupervisorMsg::ChildFailed {
      identity: self.identity,
      cause: cause,
    });
    ctx.stop();
  }
}
#[async_trait]
impl<W: Worker> Actor<WorkerMsg<W::Result>> for WorkerCoordinator<W> {
  async fn pre_start(&mut self, ctx: &ActorContext<WorkerMsg<W::Result>>) {
    for topic in [Topic::Broadcast, Topic::Shutdown] {
      let id = self.env.mediator.subscribe(topic, ctx.local_interface());
      self.subscriptions.push((topic, id));
    }
    self.membership = Some(self.env.cluster.subscribe(ctx.local_interface()));
    let state = WorkerState {
      identity: self.identity,
      node: self.env.cluster.member().address.clone(),
    };
    self
      .env
      .mediator
      .publish(Topic::Master, ControlMsg::Register(state));
    match Registration::acquire(self.env.tracker.clone(), self.identity).await {
      Ok(registration) => self.registration = Some(registration),
      Err(e) => {
        warn!(worker = %self.identity, error = %e, "could not mark worker available")
      }
    }
    info!(worker = %self.identity, master = %self.master_path, "registered with master");
  }

  async fn recv(
    &mut self,
    ctx: &ActorContext<WorkerMsg<W::Result>>,
    msg: WorkerMsg<W::Result>,
  ) {
    match msg {
      WorkerMsg::Control(ControlMsg::Round(start)) => {
        self.run_round(ctx, start).await
      }
      WorkerMsg::Control(ControlMsg::Shutdown) => {
        info!(worker = %self.identity, "shutdown received");
        ctx.stop();
      }
      WorkerMsg::Control(ControlMsg::Evicted(id)) if id == self.identity => {
        warn!(worker = %self.identity, "evicted by the master");
        let cause = ComputeFailure::Failed("evicted by the master".to_string());
        self.fail(ctx, cause);
      }
      WorkerMsg::Control(_) => {}
      WorkerMsg::Membership(ClusterEvent::MemberRemoved(member)) => {
        if &member == self.env.cluster.member() {
          warn!(worker = %self.identity, "this node left the cluster, stopping");
          ctx.stop();
        } else if Some(&member.address) == self.master_node.as_ref() {
          warn!(worker = %self.identity, master = %member, "master node removed");
        }
      }
      WorkerMsg::Membership(ClusterEvent::MemberUp(member)) => {
        trace!(worker = %self.identity, member = %member, "member up");
      }
    }
  }

  async fn post_stop(&mut self, _: &ActorContext<WorkerMsg<W::Result>>) {
    if let Some(registration) = self.registration.take() {
      registration.release().await;
    }
    if let Some(id) = self.membership.take() {
      self.env.cluster.unsubscribe(id);
    }
    for (topic, id) in self.subscriptions.drain(..) {
      self.env.mediator.unsubscribe(topic, id);
    }
    info!(worker = %self.identity, "worker stopped");
  }
}

use crate::coordination::{
  Conf, ControlMsg, Directive, SupervisionPolicy, SupervisorStatus, Worker,
  WorkerCoordinator, WorkerEnv, WorkerEvent, WorkerId, WorkerMsg, WorkerPhase,
};
use crate::core::{Actor, ActorContext, ActorSignal, LocalRef, Node};
use crate::error::{ComputeFailure, JoinError};
use crate::pubsub::Topic;
use async_trait::async_trait;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

pub enum SupervisorMsg {
  Start(oneshot::Sender<Result<WorkerId, JoinError>>),
  ChildFailed {
    identity: WorkerId,
    cause: ComputeFailure,
  },
  ChildExited {
    identity: WorkerId,
    panic: Option<String>,
  },
  Stop,
}

struct WorkerSupervisor<W, F, P>
where
  W: Worker,
{
  factory: F,
  policy: P,
  conf: Conf,
  env: WorkerEnv<W::Result>,
  child: Option<(WorkerId, LocalRef<WorkerMsg<W::Result>>)>,
  /// Set once a stop was requested; no restarts after that.
  stopping: bool,
  status: SupervisorStatus,
  watchers: watch::Sender<SupervisorStatus>,
}
impl<W, F, P> WorkerSupervisor<W, F, P>
where
  W: Worker,
  F: FnMut() -> W + Send + 'static,
  P: SupervisionPolicy,
{
  fn transition(&mut self, event: WorkerEvent) {
    let phase = self.status.phase.on(&event);
    if phase != self.status.phase {
      debug!(from = ?self.status.phase, to = ?phase, "worker phase changed");
    }
    self.status.phase = phase;
    if let WorkerEvent::Failure(cause) = event {
      self.status.last_failure = Some(cause);
    }
    let _ = self.watchers.send(self.status.clone());
  }

  fn is_current(&self, identity: &WorkerId) -> bool {
    self.child.as_ref().map_or(false, |(id, _)| id == identity)
  }

  async fn start_child(
    &mut self,
    ctx: &ActorContext<SupervisorMsg>,
  ) -> Result<WorkerId, JoinError> {
    let worker = (self.factory)();
    let (identity, child, handle) = WorkerCoordinator::start(
      worker,
      &self.conf,
      &self.env,
      ctx.local_interface(),
      &ctx.node,
    )
    .await?;
    let supervisor = ctx.local_interface::<SupervisorMsg>();
    ctx.node.rt().spawn(async move {
      let panic = handle.await.err().map(|e| e.to_string());
      supervisor.send(SupervisorMsg::ChildExited {
        identity: identity,
        panic: panic,
      });
    });
    self.child = Some((identity, child));
    self.status.identity = Some(identity);
    self.transition(WorkerEvent::Started);
    Ok(identity)
  }

  fn give_up(&mut self, ctx: &ActorContext<SupervisorMsg>) {
    self.transition(WorkerEvent::Stop);
    ctx.stop();
  }

  async fn child_failed(
    &mut self,
    ctx: &ActorContext<SupervisorMsg>,
    identity: WorkerId,
    cause: ComputeFailure,
  ) {
    if !self.is_current(&identity) || self.status.phase == WorkerPhase::Stopped
    {
      return;
    }
    error!(worker = %identity, error = %cause, "worker failed");
    self.child = None;
    self.transition(WorkerEvent::Failure(cause.clone()));
    self
      .env
      .mediator
      .publish(Topic::Master, ControlMsg::ClearWorker(identity));
    if self.stopping {
      self.give_up(ctx);
      return;
    }
    let directive = self.policy.decide(&identity, &cause);
    self.transition(WorkerEvent::Directed(directive));
    match directive {
      Directive::Restart => {
        self.status.restarts += 1;
        if let Err(e) = self.start_child(ctx).await {
          error!(error = %e, "restarted worker could not join, giving up");
          self.give_up(ctx);
        }
      }
      Directive::Stop => {
        warn!(worker = %identity, "supervision policy stopped the worker");
        ctx.stop();
      }
    }
  }
}
#[async_trait]
impl<W, F, P> Actor<SupervisorMsg> for WorkerSupervisor<W, F, P>
where
  W: Worker,
  F: FnMut() -> W + Send + 'static,
  P: SupervisionPolicy,
{
  async fn recv(&mut self, ctx: &ActorContext<SupervisorMsg>, msg: SupervisorMsg) {
    match msg {
      SupervisorMsg::Start(reply) => {
        let started = self.start_child(ctx).await;
        if let Err(e) = &started {
          error!(error = %e, "worker could not join the cluster");
          self.give_up(ctx);
        }
        let _ = reply.send(started);
      }
      SupervisorMsg::ChildFailed { identity, cause } => {
        self.child_failed(ctx, identity, cause).await
      }
      SupervisorMsg::ChildExited { identity, panic } => {
        if !self.is_current(&identity) {
          return;
        }
        match panic {
          Some(reason) => {
            let cause = ComputeFailure::Panicked(reason);
            self.child_failed(ctx, identity, cause).await
          }
          None => {
            info!(worker = %identity, "worker exited");
            self.child = None;
            self.give_up(ctx);
          }
        }
      }
      SupervisorMsg::Stop => {
        self.stopping = true;
        match &self.child {
          Some((_, child)) if child.signal(ActorSignal::Term) => {}
          _ => self.give_up(ctx),
        }
      }
    }
  }

  async fn post_stop(&mut self, _: &ActorContext<SupervisorMsg>) {
    if let Some((_, child)) = self.child.take() {
      child.signal(ActorSignal::Term);
    }
    debug!(restarts = self.status.restarts, "supervisor stopped");
  }
}

/// Observes and controls a supervised worker.
#[derive(Clone)]
pub struct WorkerHandle {
  supervisor: LocalRef<SupervisorMsg>,
  status: watch::Receiver<SupervisorStatus>,
}
impl WorkerHandle {
  pub fn status(&self) -> SupervisorStatus {
    self.status.borrow().clone()
  }

  /// Stops the current instance (which deregisters it) and then the supervisor.
  pub fn stop(&self) {
    self.supervisor.send(SupervisorMsg::Stop);
  }

  /// Waits until the status satisfies `pred`, or the supervisor is gone. Returns the last
  /// status seen either way.
  pub async fn wait_until<R>(&mut self, mut pred: R) -> SupervisorStatus
  where
    R: FnMut(&SupervisorStatus) -> bool,
  {
    loop {
      let status = self.status.borrow().clone();
      if pred(&status) || self.status.changed().await.is_err() {
        return self.status.borrow().clone();
      }
    }
  }

  pub async fn stopped(&mut self) -> SupervisorStatus {
    self.wait_until(|s| s.phase == WorkerPhase::Stopped).await
  }
}

/// Starts a supervised worker on `node`. `factory` builds a fresh worker for the first start
/// and for every restart; `policy` decides what happens after each failure.
///
/// Fails, with nothing left running, if the first instance cannot join the master's cluster.
pub async fn launch_worker<W, F, P>(
  node: &Node,
  env: WorkerEnv<W::Result>,
  conf: Conf,
  factory: F,
  policy: P,
) -> Result<WorkerHandle, JoinError>
where
  W: Worker,
  F: FnMut() -> W + Send + 'static,
  P: SupervisionPolicy,
{
  let unreachable = JoinError::Unreachable {
    address: conf.master_url.clone(),
  };
  let (tx, rx) = watch::channel(SupervisorStatus::default());
  let supervisor = WorkerSupervisor {
    factory: factory,
    policy: policy,
    conf: conf,
    env: env,
    child: None,
    stopping: false,
    status: SupervisorStatus::default(),
    watchers: tx,
  };
  let name = format!("supervisor-{:08x}", rand::random::<u32>());
  let actor = node.spawn(supervisor, name);
  let (reply, started) = oneshot::channel();
  actor.send(SupervisorMsg::Start(reply));
  match started.await {
    Ok(Ok(identity)) => {
      info!(worker = %identity, "worker launched");
      Ok(WorkerHandle {
        supervisor: actor,
        status: rx,
      })
    }
    Ok(Err(e)) => Err(e),
    Err(_) => Err(unreachable),
  }
}

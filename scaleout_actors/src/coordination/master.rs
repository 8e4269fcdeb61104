use crate::cluster::{Cluster, ClusterEvent, Member};
use crate::coordination::{
  ControlMsg, MasterConfig, RoundResult, RoundStart, Updateable, WorkerId,
  WorkerState,
};
use crate::core::{
  Actor, ActorContext, Address, LocalRef, Node, SubscriptionId,
};
use crate::pubsub::{Mediator, Topic};
use crate::tracker::SharedTracker;
use async_trait::async_trait;
use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

pub enum MasterCmd<E> {
  Snapshot(oneshot::Sender<MasterSnapshot<E>>),
  Shutdown,
}

pub enum MasterMsg<E: Send + 'static> {
  Control(ControlMsg<E>),
  Membership(ClusterEvent),
  RoundTimeout(u64),
  Cmd(MasterCmd<E>),
}
impl<E: Send + 'static> From<ControlMsg<E>> for MasterMsg<E> {
  fn from(msg: ControlMsg<E>) -> Self {
    MasterMsg::Control(msg)
  }
}
impl<E: Send + 'static> From<ClusterEvent> for MasterMsg<E> {
  fn from(event: ClusterEvent) -> Self {
    MasterMsg::Membership(event)
  }
}
impl<E: Send + 'static> From<MasterCmd<E>> for MasterMsg<E> {
  fn from(cmd: MasterCmd<E>) -> Self {
    MasterMsg::Cmd(cmd)
  }
}

/// A point-in-time view of the master.
#[derive(Clone, Debug, PartialEq)]
pub struct MasterSnapshot<E> {
  /// Rounds closed so far.
  pub completed: u64,
  pub open_round: Option<u64>,
  /// Workers the open round (or the next one) waits on.
  pub expected: im::HashSet<WorkerId>,
  /// Workers that registered mid-round and join at the next one.
  pub pending: im::HashSet<WorkerId>,
  /// Results collected so far in the open round.
  pub reported: im::HashSet<WorkerId>,
  pub state: E,
}

/// How a round ended.
#[derive(Clone, Debug, PartialEq)]
pub struct RoundOutcome<E> {
  pub round: u64,
  /// The master's state after this round. Unchanged from before the round if nobody
  /// contributed.
  pub merged: E,
  /// Sorted.
  pub contributors: Vec<WorkerId>,
  /// Workers evicted for missing the deadline. Sorted.
  pub evicted: Vec<WorkerId>,
  pub timed_out: bool,
}

struct OpenRound<E> {
  number: u64,
  tally: HashMap<WorkerId, E>,
}

/// Runs rounds over the registered workers: broadcasts the merged state, gathers exactly one
/// result per expected worker, folds them in and goes again.
///
/// A worker that is cleared or evicted is gone for good. Its identity is never expected again,
/// so anything it sends afterwards is ignored. Identities are never reused, so the set of
/// forgotten identities only grows for the length of the session.
pub struct MasterCoordinator<E: Updateable> {
  config: MasterConfig,
  mediator: Mediator<ControlMsg<E>>,
  tracker: SharedTracker,
  cluster: Option<Cluster>,
  listener: Option<LocalRef<RoundOutcome<E>>>,
  subscription: SubscriptionId,
  membership: Option<SubscriptionId>,
  state: E,
  completed: u64,
  open: Option<OpenRound<E>>,
  expected: HashSet<WorkerId>,
  pending: HashSet<WorkerId>,
  cleared: HashSet<WorkerId>,
  nodes: HashMap<WorkerId, Address>,
  finished: bool,
}
impl<E: Updateable> MasterCoordinator<E> {
  pub fn new(
    config: MasterConfig,
    mediator: Mediator<ControlMsg<E>>,
    tracker: SharedTracker,
  ) -> MasterCoordinator<E> {
    MasterCoordinator {
      config: config,
      mediator: mediator,
      tracker: tracker,
      cluster: None,
      listener: None,
      subscription: SubscriptionId::random(),
      membership: None,
      state: E::initial(),
      completed: 0,
      open: None,
      expected: HashSet::new(),
      pending: HashSet::new(),
      cleared: HashSet::new(),
      nodes: HashMap::new(),
      finished: false,
    }
  }

  /// Evict the workers of nodes this cluster instance reports as removed.
  pub fn with_cluster(mut self, cluster: Cluster) -> Self {
    self.cluster = Some(cluster);
    self
  }

  /// Receives a [`RoundOutcome`] for every closed round.
  pub fn with_listener(mut self, listener: LocalRef<RoundOutcome<E>>) -> Self {
    self.listener = Some(listener);
    self
  }

  /// Starts the master. It is subscribed to `MASTER` before this returns, so workers launched
  /// afterwards cannot announce themselves too early.
  pub fn spawn(self, node: &Node) -> MasterHandle<E> {
    let mediator = self.mediator.clone();
    let subscription = self.subscription;
    let actor = node.spawn(self, "master".to_string());
    mediator.subscribe_as(Topic::Master, subscription, actor.transform());
    MasterHandle { actor: actor }
  }

  fn snapshot(&self) -> MasterSnapshot<E> {
    MasterSnapshot {
      completed: self.completed,
      open_round: self.open.as_ref().map(|o| o.number),
      expected: self.expected.iter().copied().collect(),
      pending: self.pending.iter().copied().collect(),
      reported: self
        .open
        .iter()
        .flat_map(|o| o.tally.keys().copied())
        .collect(),
      state: self.state.clone(),
    }
  }

  fn register(&mut self, ctx: &ActorContext<MasterMsg<E>>, worker: WorkerState) {
    let id = worker.identity;
    if self.cleared.contains(&id) {
      debug!(worker = %id, "ignoring registration of a cleared worker");
      return;
    }
    if self.expected.contains(&id) || self.pending.contains(&id) {
      trace!(worker = %id, "duplicate registration");
      return;
    }
    self.nodes.insert(id, worker.node);
    if self.open.is_some() {
      info!(worker = %id, "worker registered, joins at the next round");
      self.pending.insert(id);
    } else {
      info!(worker = %id, "worker registered");
      self.expected.insert(id);
      self.maybe_open(ctx);
    }
  }

  /// Drops every trace of `id` and tombstones it. Returns whether it was known.
  fn forget(&mut self, id: WorkerId) -> bool {
    self.cleared.insert(id);
    self.nodes.remove(&id);
    let pending = self.pending.remove(&id);
    let expected = self.expected.remove(&id);
    if let Some(open) = &mut self.open {
      if open.tally.remove(&id).is_some() {
        debug!(worker = %id, round = open.number, "discarding result of a cleared worker");
      }
    }
    expected || pending
  }

  fn accept(&mut self, ctx: &ActorContext<MasterMsg<E>>, result: RoundResult<E>) {
    let open = match &mut self.open {
      Some(open) if open.number == result.round => open,
      _ => {
        debug!(
          worker = %result.worker,
          round = result.round,
          "discarding result for a round that is not open"
        );
        return;
      }
    };
    if !self.expected.contains(&result.worker) {
      debug!(worker = %result.worker, "discarding result of an unexpected worker");
      return;
    }
    if open.tally.contains_key(&result.worker) {
      trace!(worker = %result.worker, "duplicate result");
      return;
    }
    open.tally.insert(result.worker, result.result);
    self.check_complete(ctx);
  }

  fn check_complete(&mut self, ctx: &ActorContext<MasterMsg<E>>) {
    let complete = match &self.open {
      Some(open) => self.expected.iter().all(|w| open.tally.contains_key(w)),
      None => false,
    };
    if complete {
      self.close_round(ctx, Vec::new(), false);
    }
  }

  async fn timed_out(&mut self, ctx: &ActorContext<MasterMsg<E>>, round: u64) {
    let missing = match &self.open {
      Some(open) if open.number == round => self
        .expected
        .iter()
        .filter(|w| !open.tally.contains_key(*w))
        .copied()
        .sorted()
        .collect::<Vec<_>>(),
      _ => return,
    };
    warn!(round = round, missing = missing.len(), "round timed out, evicting stragglers");
    self.evict(&missing);
    self.deregister(&missing).await;
    self.close_round(ctx, missing, true);
  }

  async fn node_removed(&mut self, ctx: &ActorContext<MasterMsg<E>>, member: &Member) {
    let gone = self
      .nodes
      .iter()
      .filter(|(_, address)| **address == member.address)
      .map(|(id, _)| *id)
      .sorted()
      .collect::<Vec<_>>();
    if gone.is_empty() {
      return;
    }
    warn!(node = %member, workers = gone.len(), "node removed, evicting its workers");
    self.evict(&gone);
    self.deregister(&gone).await;
    self.check_complete(ctx);
  }

  /// Forgets the workers and tells them so. A worker that is still alive fails on its own
  /// eviction and comes back under a fresh identity.
  fn evict(&mut self, ids: &[WorkerId]) {
    for id in ids.iter() {
      self.forget(*id);
      self.mediator.publish(Topic::Broadcast, ControlMsg::Evicted(*id));
    }
  }

  /// Removes evicted workers that the ledger still lists.
  async fn deregister(&self, ids: &[WorkerId]) {
    if ids.is_empty() {
      return;
    }
    let available = match self.tracker.list_available().await {
      Ok(available) => available,
      Err(e) => {
        info!(error = %e, "tracker unavailable, leaving the ledger alone");
        return;
      }
    };
    for id in ids.iter().filter(|id| available.contains(*id)) {
      if let Err(e) = self.tracker.remove_worker(id).await {
        info!(worker = %id, error = %e, "could not remove evicted worker");
      }
    }
  }

  fn close_round(
    &mut self,
    ctx: &ActorContext<MasterMsg<E>>,
    evicted: Vec<WorkerId>,
    timed_out: bool,
  ) {
    let open = match self.open.take() {
      Some(open) => open,
      None => return,
    };
    let (contributors, results): (Vec<_>, Vec<_>) = open
      .tally
      .into_iter()
      .sorted_by_key(|(id, _)| *id)
      .unzip();
    let merged = results.into_iter().fold(E::initial(), E::merge);
    if !merged.is_empty() {
      self.state = merged;
    }
    self.completed = open.number;
    info!(
      round = open.number,
      contributors = contributors.len(),
      timed_out = timed_out,
      "round complete"
    );
    if let Some(listener) = &self.listener {
      listener.send(RoundOutcome {
        round: open.number,
        merged: self.state.clone(),
        contributors: contributors,
        evicted: evicted,
        timed_out: timed_out,
      });
    }
    if self.config.max_rounds.map_or(false, |max| self.completed >= max) {
      self.shutdown(ctx);
    } else {
      self.maybe_open(ctx);
    }
  }

  fn maybe_open(&mut self, ctx: &ActorContext<MasterMsg<E>>) {
    if self.finished || self.open.is_some() {
      return;
    }
    self.expected.extend(self.pending.drain());
    if self.expected.len() < self.config.min_workers.max(1) {
      return;
    }
    let number = self.completed + 1;
    self.open = Some(OpenRound {
      number: number,
      tally: HashMap::new(),
    });
    debug!(round = number, workers = self.expected.len(), "opening round");
    ctx.node.schedule_local_msg(
      self.config.round_timeout,
      ctx.local_interface(),
      MasterMsg::RoundTimeout(number),
    );
    self.mediator.publish(
      Topic::Broadcast,
      ControlMsg::Round(RoundStart {
        round: number,
        state: self.state.clone(),
      }),
    );
  }

  fn shutdown(&mut self, ctx: &ActorContext<MasterMsg<E>>) {
    if self.finished {
      return;
    }
    self.finished = true;
    self.open = None;
    info!(completed = self.completed, "shutting down the fleet");
    self.mediator.publish(Topic::Shutdown, ControlMsg::Shutdown);
    ctx.stop();
  }
}
#[async_trait]
impl<E: Updateable> Actor<MasterMsg<E>> for MasterCoordinator<E> {
  async fn pre_start(&mut self, ctx: &ActorContext<MasterMsg<E>>) {
    if let Some(cluster) = &self.cluster {
      self.membership = Some(cluster.subscribe(ctx.local_interface()));
    }
    info!(node = %ctx.node.address(), "master started");
  }

  async fn recv(&mut self, ctx: &ActorContext<MasterMsg<E>>, msg: MasterMsg<E>) {
    if self.finished {
      return;
    }
    match msg {
      MasterMsg::Control(ControlMsg::Register(worker)) => {
        self.register(ctx, worker)
      }
      MasterMsg::Control(ControlMsg::ClearWorker(id)) => {
        if self.forget(id) {
          info!(worker = %id, "worker cleared");
        }
        self.check_complete(ctx);
      }
      MasterMsg::Control(ControlMsg::Result(result)) => {
        self.accept(ctx, result)
      }
      MasterMsg::Control(_) => {}
      MasterMsg::Membership(ClusterEvent::MemberRemoved(member)) => {
        self.node_removed(ctx, &member).await
      }
      MasterMsg::Membership(ClusterEvent::MemberUp(member)) => {
        trace!(member = %member, "member up");
      }
      MasterMsg::RoundTimeout(round) => self.timed_out(ctx, round).await,
      MasterMsg::Cmd(MasterCmd::Snapshot(reply)) => {
        let _ = reply.send(self.snapshot());
      }
      MasterMsg::Cmd(MasterCmd::Shutdown) => self.shutdown(ctx),
    }
  }

  async fn post_stop(&mut self, _: &ActorContext<MasterMsg<E>>) {
    self.mediator.unsubscribe(Topic::Master, self.subscription);
    if let (Some(cluster), Some(id)) = (&self.cluster, self.membership.take()) {
      cluster.unsubscribe(id);
    }
  }
}

/// A handle to a running master.
pub struct MasterHandle<E: Send + 'static> {
  actor: LocalRef<MasterMsg<E>>,
}
impl<E: Send + 'static> Clone for MasterHandle<E> {
  fn clone(&self) -> Self {
    MasterHandle {
      actor: self.actor.clone(),
    }
  }
}
impl<E: Send + 'static> MasterHandle<E> {
  /// `None` once the master has stopped.
  pub async fn snapshot(&self) -> Option<MasterSnapshot<E>> {
    let (tx, rx) = oneshot::channel();
    self.actor.send(MasterCmd::Snapshot(tx).into());
    rx.await.ok()
  }

  /// Publishes `SHUTDOWN` to the fleet and stops the master.
  pub fn shutdown(&self) {
    self.actor.send(MasterCmd::Shutdown.into());
  }

  /// Sends control messages straight to the master, bypassing the mediator.
  pub fn client(&self) -> LocalRef<ControlMsg<E>> {
    self.actor.transform()
  }
}

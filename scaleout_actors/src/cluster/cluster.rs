use crate::cluster::{ClusterEvent, ClusterNetwork, Gossip, MachineState, Member};
use crate::core::{
  Actor, ActorContext, Address, LocalRef, Node, SubscriptionId,
};
use crate::error::JoinError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

pub enum ClusterMsg {
  Intra(IntraClusterMsg),
  Cmd(ClusterCmd),
}
impl From<IntraClusterMsg> for ClusterMsg {
  fn from(msg: IntraClusterMsg) -> Self {
    ClusterMsg::Intra(msg)
  }
}
impl From<ClusterCmd> for ClusterMsg {
  fn from(cmd: ClusterCmd) -> Self {
    ClusterMsg::Cmd(cmd)
  }
}

pub enum IntraClusterMsg {
  Join(Arc<Member>),
  Gossip(Gossip),
}

pub enum ClusterCmd {
  Join(Address, oneshot::Sender<Result<(), JoinError>>),
  Subscribe(SubscriptionId, LocalRef<ClusterEvent>),
  Unsubscribe(SubscriptionId),
  Leave,
  Down(Address),
  Members(oneshot::Sender<im::HashSet<Arc<Member>>>),
}

struct ClusterState {
  member: Arc<Member>,
  network: ClusterNetwork,
  gossip: Gossip,
  subscribers: HashMap<SubscriptionId, LocalRef<ClusterEvent>>,
}
impl ClusterState {
  fn publish(&mut self, events: Vec<ClusterEvent>) {
    if events.is_empty() {
      return;
    }
    for e in events.iter() {
      debug!(node = %self.member, event = ?e, "membership changed");
    }
    self
      .subscribers
      .retain(|_, r| events.iter().all(|e| r.send(e.clone())));
  }

  fn disperse(&self) {
    for member in self.gossip.states.keys() {
      if *member != self.member {
        let msg = IntraClusterMsg::Gossip(self.gossip.clone());
        if !self.network.send(&member.address, msg) {
          trace!(node = %self.member, to = %member, "gossip not delivered");
        }
      }
    }
  }

  fn join(&self, seed: Address) -> Result<(), JoinError> {
    if seed == self.member.address {
      info!(node = %self.member, "joined self, forming a cluster");
      return Ok(());
    }
    let msg = IntraClusterMsg::Join(self.member.clone());
    if self.network.send(&seed, msg) {
      info!(node = %self.member, seed = %seed, "join request sent");
      Ok(())
    } else {
      Err(JoinError::Unreachable {
        address: seed.to_string(),
      })
    }
  }
}
#[async_trait]
impl Actor<ClusterMsg> for ClusterState {
  async fn pre_start(&mut self, _: &ActorContext<ClusterMsg>) {
    self.gossip.mark(self.member.clone(), MachineState::Up);
  }

  async fn recv(&mut self, ctx: &ActorContext<ClusterMsg>, msg: ClusterMsg) {
    match msg {
      ClusterMsg::Intra(IntraClusterMsg::Join(member)) => {
        let events = self.gossip.mark(member, MachineState::Up);
        self.publish(events.into_iter().collect());
        self.disperse();
      }
      ClusterMsg::Intra(IntraClusterMsg::Gossip(gossip)) => {
        let events = self.gossip.merge(gossip);
        self.publish(events);
        if !self.gossip.is_up(&self.member) {
          warn!(node = %self.member, "this node was downed, leaving");
          ctx.stop();
        }
      }
      ClusterMsg::Cmd(ClusterCmd::Join(seed, reply)) => {
        let _ = reply.send(self.join(seed));
      }
      ClusterMsg::Cmd(ClusterCmd::Subscribe(id, subscriber)) => {
        let alive = self
          .gossip
          .up()
          .all(|m| subscriber.send(ClusterEvent::MemberUp(m.clone())));
        if alive {
          self.subscribers.insert(id, subscriber);
        }
      }
      ClusterMsg::Cmd(ClusterCmd::Unsubscribe(id)) => {
        self.subscribers.remove(&id);
      }
      ClusterMsg::Cmd(ClusterCmd::Leave) => {
        let events = self.gossip.mark(self.member.clone(), MachineState::Down);
        self.publish(events.into_iter().collect());
        self.disperse();
        info!(node = %self.member, "left the cluster");
        ctx.stop();
      }
      ClusterMsg::Cmd(ClusterCmd::Down(address)) => {
        let targets = self
          .gossip
          .up()
          .filter(|m| m.address == address)
          .cloned()
          .collect::<Vec<_>>();
        let events = targets
          .into_iter()
          .filter_map(|m| self.gossip.mark(m, MachineState::Down))
          .collect::<Vec<_>>();
        if !events.is_empty() {
          info!(node = %self.member, downed = %address, "marked down");
          self.publish(events);
          self.disperse();
        }
      }
      ClusterMsg::Cmd(ClusterCmd::Members(reply)) => {
        let _ = reply.send(self.gossip.up().cloned().collect());
      }
    }
  }

  async fn post_stop(&mut self, _: &ActorContext<ClusterMsg>) {
    self.network.unbind(&self.member.address);
  }
}

/// A handle to this node's cluster instance. Created once per node and passed explicitly to
/// whatever needs membership.
#[derive(Clone)]
pub struct Cluster {
  member: Arc<Member>,
  cmd: LocalRef<ClusterCmd>,
}
impl Cluster {
  /// Starts the instance and makes it reachable on the node's address straight away.
  pub fn new(node: &Node, network: &ClusterNetwork) -> Cluster {
    let member = Arc::new(Member {
      address: node.address().clone(),
      id: rand::random(),
    });
    let state = ClusterState {
      member: member.clone(),
      network: network.clone(),
      gossip: Gossip::default(),
      subscribers: HashMap::new(),
    };
    let actor = node.spawn(state, format!("cluster-{:x}", member.id));
    network.bind(member.address.clone(), actor.transform());
    Cluster {
      member: member,
      cmd: actor.transform(),
    }
  }

  pub fn member(&self) -> &Arc<Member> {
    &self.member
  }

  /// Asks the node at `url` to let this node in. Joining this node's own address forms a new
  /// cluster. Joining again is harmless.
  pub async fn join(&self, url: &str) -> Result<(), JoinError> {
    let seed = url.parse::<Address>().map_err(|e| JoinError::Malformed {
      url: url.to_string(),
      source: e,
    })?;
    let unreachable = JoinError::Unreachable {
      address: seed.to_string(),
    };
    let (tx, rx) = oneshot::channel();
    if !self.cmd.send(ClusterCmd::Join(seed, tx)) {
      return Err(unreachable);
    }
    rx.await.unwrap_or(Err(unreachable))
  }

  pub fn subscribe(&self, subscriber: LocalRef<ClusterEvent>) -> SubscriptionId {
    let id = SubscriptionId::random();
    self.cmd.send(ClusterCmd::Subscribe(id, subscriber));
    id
  }

  pub fn unsubscribe(&self, id: SubscriptionId) {
    self.cmd.send(ClusterCmd::Unsubscribe(id));
  }

  pub fn leave(&self) {
    self.cmd.send(ClusterCmd::Leave);
  }

  /// Marks every member at `address` as down and tells the rest of the cluster.
  pub fn down(&self, address: Address) {
    self.cmd.send(ClusterCmd::Down(address));
  }

  /// The members this instance currently believes are up. Empty once the instance is gone.
  pub async fn members(&self) -> im::HashSet<Arc<Member>> {
    let (tx, rx) = oneshot::channel();
    self.cmd.send(ClusterCmd::Members(tx));
    rx.await.unwrap_or_default()
  }
}

use crate::core::{Actor, ActorContext, LocalRef, Node, SubscriptionId};
use crate::testkit::FailureConfig;
use async_trait::async_trait;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// The well-known control topics.
#[derive(
  Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Topic {
  /// Everything addressed to the master: registrations, results, clear-worker events.
  Master,
  /// The master's per-round signal to all workers.
  Broadcast,
  Shutdown,
}
impl Topic {
  pub fn name(&self) -> &'static str {
    match self {
      Topic::Master => "MASTER",
      Topic::Broadcast => "BROADCAST",
      Topic::Shutdown => "SHUTDOWN",
    }
  }
}
impl Display for Topic {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.name())
  }
}

pub enum MediatorMsg<M: Send + 'static> {
  Publish(Topic, M),
  Subscribe(Topic, SubscriptionId, LocalRef<M>),
  Unsubscribe(Topic, SubscriptionId),
  Subscribers(Topic, oneshot::Sender<usize>),
}

struct MediatorState<M: Send + 'static> {
  topics: HashMap<Topic, Vec<(SubscriptionId, LocalRef<M>)>>,
  failures: FailureConfig,
  rng: SmallRng,
}
impl<M: Clone + Send + 'static> MediatorState<M> {
  fn deliver(
    &mut self,
    ctx: &ActorContext<MediatorMsg<M>>,
    topic: Topic,
    msg: M,
  ) {
    let failures = self.failures;
    let rng = &mut self.rng;
    let subscribers = match self.topics.get_mut(&topic) {
      Some(s) => s,
      None => {
        trace!(topic = %topic, "published to a topic nobody subscribes to");
        return;
      }
    };
    subscribers.retain(|(id, subscriber)| {
      let mut alive = true;
      for _ in 0..failures.copies(rng) {
        match failures.delay(rng) {
          Some(delay) => {
            let subscriber = subscriber.clone();
            Self::deliver_later(ctx, topic, *id, subscriber, delay, msg.clone())
          }
          None => alive &= subscriber.send(msg.clone()),
        }
      }
      if !alive {
        debug!(topic = %topic, subscription = %id, "dropping dead subscriber");
      }
      alive
    });
  }

  /// A delayed copy that finds its subscriber gone unsubscribes it once the delay is up.
  fn deliver_later(
    ctx: &ActorContext<MediatorMsg<M>>,
    topic: Topic,
    id: SubscriptionId,
    subscriber: LocalRef<M>,
    delay: Duration,
    msg: M,
  ) {
    let pending = ctx.node.schedule_local_msg(delay, subscriber, msg);
    let mediator = ctx.local_interface::<MediatorMsg<M>>();
    ctx.node.rt().spawn(async move {
      if let Ok(false) = pending.await {
        debug!(topic = %topic, subscription = %id, "dropping dead subscriber");
        mediator.send(MediatorMsg::Unsubscribe(topic, id));
      }
    });
  }
}
#[async_trait]
impl<M: Clone + Send + 'static> Actor<MediatorMsg<M>> for MediatorState<M> {
  async fn recv(
    &mut self,
    ctx: &ActorContext<MediatorMsg<M>>,
    msg: MediatorMsg<M>,
  ) {
    match msg {
      MediatorMsg::Publish(topic, msg) => self.deliver(ctx, topic, msg),
      MediatorMsg::Subscribe(topic, id, subscriber) => {
        trace!(topic = %topic, subscription = %id, "subscribed");
        self
          .topics
          .entry(topic)
          .or_insert_with(Vec::new)
          .push((id, subscriber));
      }
      MediatorMsg::Unsubscribe(topic, id) => {
        if let Some(subscribers) = self.topics.get_mut(&topic) {
          subscribers.retain(|(sub, _)| *sub != id);
        }
      }
      MediatorMsg::Subscribers(topic, reply) => {
        let _ = reply.send(self.topics.get(&topic).map_or(0, Vec::len));
      }
    }
  }
}

/// A handle to a mediator actor. Cheap to clone; hand one to every coordinator that should
/// share the same topics.
pub struct Mediator<M: Send + 'static> {
  actor: LocalRef<MediatorMsg<M>>,
}
impl<M: Send + 'static> Clone for Mediator<M> {
  fn clone(&self) -> Self {
    Mediator {
      actor: self.actor.clone(),
    }
  }
}
impl<M: Clone + Send + 'static> Mediator<M> {
  pub fn new(node: &Node) -> Mediator<M> {
    Self::with_failures(node, FailureConfig::default())
  }

  /// A mediator that duplicates and delays deliveries as `failures` describes.
  pub fn with_failures(node: &Node, failures: FailureConfig) -> Mediator<M> {
    let state = MediatorState {
      topics: HashMap::new(),
      failures: failures,
      rng: SmallRng::from_entropy(),
    };
    Mediator {
      actor: node.spawn(state, "mediator".to_string()),
    }
  }

  /// Returns `false` if the mediator is gone.
  pub fn publish(&self, topic: Topic, msg: M) -> bool {
    self.actor.send(MediatorMsg::Publish(topic, msg))
  }

  pub fn subscribe(&self, topic: Topic, subscriber: LocalRef<M>) -> SubscriptionId {
    let id = SubscriptionId::random();
    self.subscribe_as(topic, id, subscriber);
    id
  }

  /// Subscribes under an id the caller picked, so the id can be handed to the subscriber
  /// before it starts running.
  pub fn subscribe_as(
    &self,
    topic: Topic,
    id: SubscriptionId,
    subscriber: LocalRef<M>,
  ) {
    self.actor.send(MediatorMsg::Subscribe(topic, id, subscriber));
  }

  pub fn unsubscribe(&self, topic: Topic, id: SubscriptionId) {
    self.actor.send(MediatorMsg::Unsubscribe(topic, id));
  }

  /// How many subscribers `topic` has right now. Zero if the mediator is gone.
  pub async fn subscribers(&self, topic: Topic) -> usize {
    let (tx, rx) = oneshot::channel();
    if !self.actor.send(MediatorMsg::Subscribers(topic, tx)) {
      return 0;
    }
    rx.await.unwrap_or(0)
  }
}

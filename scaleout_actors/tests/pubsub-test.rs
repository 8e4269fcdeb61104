mod common;

use common::*;
use scaleout_actors::core::{LocalRef, Node};
use scaleout_actors::pubsub::{Mediator, Topic};
use scaleout_actors::testkit::{init_test_logging, FailureConfig};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::time::{sleep, timeout};

async fn drain(rx: &mut UnboundedReceiver<u32>) -> Vec<u32> {
  sleep(Duration::from_millis(100)).await;
  let mut got = Vec::new();
  while let Ok(x) = rx.try_recv() {
    got.push(x);
  }
  got.sort_unstable();
  got
}

#[tokio::test]
async fn test_topics_are_separate() {
  init_test_logging(tracing::Level::DEBUG);
  let node = Node::new(addr(5000));
  let mediator = Mediator::<u32>::new(&node);
  let (tx_a, mut rx_a) = unbounded_channel();
  let (tx_b, mut rx_b) = unbounded_channel();
  let (tx_c, mut rx_c) = unbounded_channel();
  mediator.subscribe(Topic::Broadcast, LocalRef::from(tx_a));
  let id_b = mediator.subscribe(Topic::Broadcast, LocalRef::from(tx_b));
  mediator.subscribe(Topic::Shutdown, LocalRef::from(tx_c));
  assert!(mediator.publish(Topic::Broadcast, 1));
  assert!(mediator.publish(Topic::Master, 2));
  assert_eq!(timeout(TIMEOUT, rx_a.recv()).await, Ok(Some(1)));
  assert_eq!(timeout(TIMEOUT, rx_b.recv()).await, Ok(Some(1)));

  mediator.unsubscribe(Topic::Broadcast, id_b);
  mediator.publish(Topic::Broadcast, 3);
  mediator.publish(Topic::Shutdown, 4);
  assert_eq!(drain(&mut rx_a).await, vec![3]);
  assert_eq!(drain(&mut rx_b).await, Vec::<u32>::new());
  assert_eq!(drain(&mut rx_c).await, vec![4]);
}

#[tokio::test]
async fn test_duplicating_mediator_never_drops() {
  init_test_logging(tracing::Level::DEBUG);
  let node = Node::new(addr(5000));
  let failures = FailureConfig {
    duplicate_prob: 1.0,
    delay: Some((Duration::from_millis(1), Duration::from_millis(30))),
  };
  let mediator = Mediator::<u32>::with_failures(&node, failures);
  let (tx, mut rx) = unbounded_channel();
  mediator.subscribe(Topic::Master, LocalRef::from(tx));
  for x in 0..5 {
    mediator.publish(Topic::Master, x);
  }
  assert_eq!(drain(&mut rx).await, vec![0, 0, 1, 1, 2, 2, 3, 3, 4, 4]);
}

#[tokio::test]
async fn test_dead_subscribers_pruned() {
  init_test_logging(tracing::Level::DEBUG);
  let node = Node::new(addr(5000));
  let mediator = Mediator::<u32>::new(&node);
  let (tx, rx) = unbounded_channel();
  let (live_tx, mut live_rx) = unbounded_channel();
  mediator.subscribe(Topic::Broadcast, LocalRef::from(tx));
  mediator.subscribe(Topic::Broadcast, LocalRef::from(live_tx));
  drop(rx);
  mediator.publish(Topic::Broadcast, 7);
  mediator.publish(Topic::Broadcast, 8);
  assert_eq!(drain(&mut live_rx).await, vec![7, 8]);
  assert_eq!(mediator.subscribers(Topic::Broadcast).await, 1);
}

#[tokio::test]
async fn test_dead_subscribers_pruned_under_delay() {
  init_test_logging(tracing::Level::DEBUG);
  let node = Node::new(addr(5000));
  let failures = FailureConfig {
    duplicate_prob: 0.0,
    delay: Some((Duration::from_millis(1), Duration::from_millis(20))),
  };
  let mediator = Mediator::<u32>::with_failures(&node, failures);
  let (tx, rx) = unbounded_channel();
  let (live_tx, mut live_rx) = unbounded_channel();
  mediator.subscribe(Topic::Broadcast, LocalRef::from(tx));
  mediator.subscribe(Topic::Broadcast, LocalRef::from(live_tx));
  assert_eq!(mediator.subscribers(Topic::Broadcast).await, 2);
  drop(rx);
  for x in 0..3 {
    mediator.publish(Topic::Broadcast, x);
  }
  assert_eq!(drain(&mut live_rx).await, vec![0, 1, 2]);
  eventually("dead subscriber unsubscribed", || {
    let mediator = mediator.clone();
    async move { mediator.subscribers(Topic::Broadcast).await == 1 }
  })
  .await;
  mediator.publish(Topic::Broadcast, 3);
  assert_eq!(drain(&mut live_rx).await, vec![3]);
  assert_eq!(mediator.subscribers(Topic::Shutdown).await, 0);
}

mod common;

use common::*;
use scaleout_actors::coordination::{
  launch_worker, AlwaysRestart, Conf, Directive, MasterConfig, Total,
  WorkerId, WorkerPhase,
};
use scaleout_actors::error::{ComputeFailure, JoinError};
use scaleout_actors::tracker::StateTracker;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test]
async fn test_worker_rounds_then_graceful_shutdown() {
  let config = MasterConfig {
    max_rounds: Some(2),
    ..MasterConfig::default()
  };
  let mut fleet = Fleet::new(config).await;
  let (node, env) = fleet.worker_env(3001);
  let mut conf = fleet.conf();
  conf.extra_params = vec![5.0];
  let mut handle =
    launch_worker(&node, env, conf, adders(1, 0, false), AlwaysRestart)
      .await
      .unwrap();
  let identity = handle.status().identity.unwrap();

  let first = fleet.next_outcome().await;
  assert_eq!(first.contributors, vec![identity]);
  assert_eq!(first.merged, Total::of(5));
  let second = fleet.next_outcome().await;
  assert_eq!(second.round, 2);
  assert_eq!(second.merged, Total::of(5));

  let status = handle.stopped().await;
  assert_eq!(status.phase, WorkerPhase::Stopped);
  assert_eq!(status.restarts, 0);
  assert_eq!(fleet.tracker.list_available().await, Ok(im::hashset![]));
  assert_eq!(fleet.tracker.removals(&identity), 1);
}

async fn crash_and_restart(panics: bool) {
  let mut fleet = Fleet::new(MasterConfig::default()).await;
  let (node, env) = fleet.worker_env(3001);
  let mut handle = launch_worker(
    &node,
    env,
    fleet.conf(),
    adders(4, 1, panics),
    AlwaysRestart,
  )
  .await
  .unwrap();
  let first = handle.status().identity.unwrap();

  let status = handle.wait_until(|s| s.restarts == 1).await;
  let second = status.identity.unwrap();
  assert_ne!(first, second);
  match status.last_failure {
    Some(ComputeFailure::Panicked(_)) => assert!(panics),
    Some(ComputeFailure::Failed(_)) => assert!(!panics),
    None => panic!("restart without a recorded failure"),
  }

  // The first instance's round closes empty once it is cleared; the new instance is
  // picked up in the next one.
  let mut outcome = fleet.next_outcome().await;
  while outcome.contributors.is_empty() {
    assert_eq!(outcome.merged, Total::default());
    outcome = fleet.next_outcome().await;
  }
  assert_eq!(outcome.contributors, vec![second]);
  assert_eq!(outcome.merged, Total::of(4));
  assert_eq!(handle.status().phase, WorkerPhase::Running);

  let tracker = fleet.tracker.clone();
  eventually("old identity to leave the ledger", || {
    let tracker = tracker.clone();
    async move { tracker.removals(&first) == 1 }
  })
  .await;
  sleep(Duration::from_millis(50)).await;
  assert_eq!(fleet.tracker.removals(&first), 1);
  assert_eq!(fleet.tracker.list_available().await, Ok(im::hashset![second]));
}

#[tokio::test]
async fn test_failed_worker_restarts_with_new_identity() {
  crash_and_restart(false).await;
}

#[tokio::test]
async fn test_panicked_worker_restarts_with_new_identity() {
  crash_and_restart(true).await;
}

#[tokio::test]
async fn test_stop_directive_ends_supervision() {
  let fleet = Fleet::new(MasterConfig::default()).await;
  let (node, env) = fleet.worker_env(3001);
  let policy = |_: &WorkerId, _: &ComputeFailure| Directive::Stop;
  let mut handle =
    launch_worker(&node, env, fleet.conf(), adders(1, 1, false), policy)
      .await
      .unwrap();
  let identity = handle.status().identity.unwrap();
  let status = handle.stopped().await;
  assert_eq!(status.restarts, 0);
  assert_eq!(status.identity, Some(identity));
  assert!(matches!(status.last_failure, Some(ComputeFailure::Failed(_))));
  let tracker = fleet.tracker.clone();
  eventually("stopped worker to leave the ledger", || {
    let tracker = tracker.clone();
    async move { tracker.removals(&identity) == 1 }
  })
  .await;
  let master = fleet.master.clone();
  eventually("master to forget the worker", || {
    let master = master.clone();
    async move { master.snapshot().await.unwrap().expected.is_empty() }
  })
  .await;
}

#[tokio::test]
async fn test_explicit_stop_deregisters() {
  let config = MasterConfig {
    min_workers: 5,
    ..MasterConfig::default()
  };
  let fleet = Fleet::new(config).await;
  let (node, env) = fleet.worker_env(3001);
  let mut handle =
    launch_worker(&node, env, fleet.conf(), adders(1, 0, false), AlwaysRestart)
      .await
      .unwrap();
  let identity = handle.status().identity.unwrap();
  let tracker = fleet.tracker.clone();
  eventually("worker to register", || {
    let tracker = tracker.clone();
    async move { tracker.is_available(&identity).await == Ok(true) }
  })
  .await;
  handle.stop();
  assert_eq!(handle.stopped().await.phase, WorkerPhase::Stopped);
  assert_eq!(fleet.tracker.is_available(&identity).await, Ok(false));
  assert_eq!(fleet.tracker.removals(&identity), 1);
}

#[tokio::test]
async fn test_failure_while_stopping_clears_worker() {
  let config = MasterConfig {
    round_timeout: Duration::from_secs(60),
    ..MasterConfig::default()
  };
  let mut fleet = Fleet::new(config).await;
  let (node, env) = fleet.worker_env(3001);
  let stall = Duration::from_millis(500);
  let mut handle = launch_worker(
    &node,
    env,
    fleet.conf(),
    stalling_adders(1, stall, true),
    AlwaysRestart,
  )
  .await
  .unwrap();
  let identity = handle.status().identity.unwrap();
  let master = fleet.master.clone();
  eventually("round 1 to open", || {
    let master = master.clone();
    async move { master.snapshot().await.unwrap().open_round == Some(1) }
  })
  .await;
  // Let the worker get into its compute before asking it to stop.
  sleep(Duration::from_millis(100)).await;
  handle.stop();

  let status = handle.stopped().await;
  assert_eq!(status.phase, WorkerPhase::Stopped);
  assert_eq!(status.restarts, 0);
  assert!(matches!(status.last_failure, Some(ComputeFailure::Failed(_))));

  // The round closes on the clear rather than waiting out its deadline.
  let outcome = fleet.next_outcome().await;
  assert_eq!(outcome.round, 1);
  assert!(!outcome.timed_out);
  assert!(outcome.contributors.is_empty());
  let snapshot = fleet.master.snapshot().await.unwrap();
  assert!(!snapshot.expected.contains(&identity));
  assert!(!snapshot.pending.contains(&identity));
}

#[tokio::test]
async fn test_evicted_worker_rejoins_under_new_identity() {
  let config = MasterConfig {
    round_timeout: Duration::from_millis(200),
    ..MasterConfig::default()
  };
  let mut fleet = Fleet::new(config).await;
  let (node, env) = fleet.worker_env(3001);
  let stall = Duration::from_millis(600);
  let mut handle = launch_worker(
    &node,
    env,
    fleet.conf(),
    stalling_adders(3, stall, false),
    AlwaysRestart,
  )
  .await
  .unwrap();
  let first = handle.status().identity.unwrap();

  let missed = fleet.next_outcome().await;
  assert_eq!(missed.round, 1);
  assert!(missed.timed_out);
  assert_eq!(missed.evicted, vec![first]);
  assert!(missed.contributors.is_empty());

  let status = handle.wait_until(|s| s.restarts == 1).await;
  let second = status.identity.unwrap();
  assert_ne!(first, second);
  assert!(matches!(status.last_failure, Some(ComputeFailure::Failed(_))));

  let outcome = fleet.next_outcome().await;
  assert_eq!(outcome.round, 2);
  assert_eq!(outcome.contributors, vec![second]);
  assert_eq!(outcome.merged, Total::of(3));
  assert_eq!(handle.status().phase, WorkerPhase::Running);
}

#[tokio::test]
async fn test_removed_node_evicted() {
  let config = MasterConfig {
    min_workers: 5,
    ..MasterConfig::default()
  };
  let fleet = Fleet::new(config).await;
  let (node, env) = fleet.worker_env(3001);
  let mut handle =
    launch_worker(&node, env, fleet.conf(), adders(1, 0, false), AlwaysRestart)
      .await
      .unwrap();
  let identity = handle.status().identity.unwrap();
  let master = fleet.master.clone();
  eventually("master to see the worker", || {
    let master = master.clone();
    async move { master.snapshot().await.unwrap().expected.contains(&identity) }
  })
  .await;
  let tracker = fleet.tracker.clone();
  eventually("worker to register", || {
    let tracker = tracker.clone();
    async move { tracker.is_available(&identity).await == Ok(true) }
  })
  .await;

  fleet.cluster.down(addr(3001));
  assert_eq!(handle.stopped().await.phase, WorkerPhase::Stopped);
  eventually("master to evict the worker", || {
    let master = master.clone();
    async move { master.snapshot().await.unwrap().expected.is_empty() }
  })
  .await;
  assert_eq!(fleet.tracker.is_available(&identity).await, Ok(false));
}

#[tokio::test]
async fn test_launch_join_errors() {
  let fleet = Fleet::new(MasterConfig::default()).await;

  let (node, env) = fleet.worker_env(3001);
  let conf = Conf {
    master_url: "fleet@127.0.0.1".to_string(),
    ..fleet.conf()
  };
  let err = launch_worker(&node, env, conf, adders(1, 0, false), AlwaysRestart)
    .await
    .err();
  assert!(matches!(err, Some(JoinError::Malformed { .. })));

  let (node, env) = fleet.worker_env(3002);
  let conf = Conf::with_master(&addr(4999));
  let err = launch_worker(&node, env, conf, adders(1, 0, false), AlwaysRestart)
    .await
    .err();
  assert_eq!(
    err,
    Some(JoinError::Unreachable {
      address: addr(4999).to_string()
    })
  );
  assert_eq!(fleet.tracker.list_available().await, Ok(im::hashset![]));
}

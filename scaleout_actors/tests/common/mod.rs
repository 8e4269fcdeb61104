#![allow(dead_code)]
use async_trait::async_trait;
use scaleout_actors::cluster::{Cluster, ClusterNetwork};
use scaleout_actors::coordination::{
  Conf, ControlMsg, MasterConfig, MasterCoordinator, MasterHandle,
  RoundOutcome, Total, Worker, WorkerEnv, WorkerId,
};
use scaleout_actors::core::{Address, LocalRef, Node};
use scaleout_actors::error::{ComputeFailure, TrackerError};
use scaleout_actors::pubsub::Mediator;
use scaleout_actors::testkit::{init_test_logging, FailureConfig};
use scaleout_actors::tracker::{InMemoryStateTracker, StateTracker};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::time::{sleep, timeout};

pub const MASTER_PORT: u16 = 2552;
pub const TIMEOUT: Duration = Duration::from_millis(5_000);

pub fn addr(port: u16) -> Address {
  Address::new("scaleout", "fleet", "127.0.0.1", port)
}

/// A ledger that remembers how often each identity was asked to leave it.
#[derive(Default)]
pub struct CountingTracker {
  inner: InMemoryStateTracker,
  removals: Mutex<HashMap<WorkerId, usize>>,
}
impl CountingTracker {
  pub fn removals(&self, id: &WorkerId) -> usize {
    let removals = self.removals.lock().unwrap();
    removals.get(id).copied().unwrap_or(0)
  }
}
#[async_trait]
impl StateTracker for CountingTracker {
  async fn mark_available(&self, id: &WorkerId) -> Result<(), TrackerError> {
    self.inner.mark_available(id).await
  }

  async fn remove_worker(&self, id: &WorkerId) -> Result<(), TrackerError> {
    *self.removals.lock().unwrap().entry(*id).or_insert(0) += 1;
    self.inner.remove_worker(id).await
  }

  async fn list_available(&self) -> Result<im::HashSet<WorkerId>, TrackerError> {
    self.inner.list_available().await
  }
}

/// Adds a fixed amount each round. `fail` makes the first compute panic (`Some(true)`) or
/// return an error (`Some(false)`). `stall` holds up the first compute for that long.
pub struct Adder {
  pub amount: i64,
  pub fail: Option<bool>,
  pub stall: Option<Duration>,
  pub e: Total,
  pub last: Option<Total>,
}
impl Worker for Adder {
  type Result = Total;

  fn setup(&mut self, conf: &Conf) {
    if let Some(amount) = conf.extra_params.first() {
      self.amount = *amount as i64;
    }
  }

  fn compute(&mut self) -> Result<Total, ComputeFailure> {
    if let Some(stall) = self.stall.take() {
      std::thread::sleep(stall);
    }
    match self.fail.take() {
      Some(true) => panic!("adder blew up"),
      Some(false) => Err(ComputeFailure::Failed("adder gave up".to_string())),
      None => {
        self.last = Some(Total::of(self.amount));
        Ok(Total::of(self.amount))
      }
    }
  }

  fn update(&mut self, e: Total) {
    self.e = e;
  }

  fn get_e(&self) -> &Total {
    &self.e
  }

  fn results(&self) -> Option<&Total> {
    self.last.as_ref()
  }
}

/// Builds adders. The first `fail_first` instances fail once; `panics` picks how.
pub fn adders(
  amount: i64,
  fail_first: usize,
  panics: bool,
) -> impl FnMut() -> Adder + Send + 'static {
  let built = Arc::new(AtomicUsize::new(0));
  move || {
    let n = built.fetch_add(1, Ordering::SeqCst);
    Adder {
      amount: amount,
      fail: if n < fail_first { Some(panics) } else { None },
      stall: None,
      e: Total::default(),
      last: None,
    }
  }
}

/// Builds adders whose first instance stalls its first compute, then errors if `fails`.
pub fn stalling_adders(
  amount: i64,
  stall: Duration,
  fails: bool,
) -> impl FnMut() -> Adder + Send + 'static {
  let mut built = 0usize;
  move || {
    built += 1;
    let first = built == 1;
    Adder {
      amount: amount,
      fail: if first && fails { Some(false) } else { None },
      stall: if first { Some(stall) } else { None },
      e: Total::default(),
      last: None,
    }
  }
}

pub struct Fleet {
  pub network: ClusterNetwork,
  pub node: Node,
  pub cluster: Cluster,
  pub mediator: Mediator<ControlMsg<Total>>,
  pub tracker: Arc<CountingTracker>,
  pub master: MasterHandle<Total>,
  pub outcomes: UnboundedReceiver<RoundOutcome<Total>>,
}
impl Fleet {
  pub async fn new(config: MasterConfig) -> Fleet {
    Self::with_failures(config, FailureConfig::default()).await
  }

  /// A fleet whose mediator misbehaves as `failures` describes.
  pub async fn with_failures(
    config: MasterConfig,
    failures: FailureConfig,
  ) -> Fleet {
    init_test_logging(tracing::Level::DEBUG);
    let network = ClusterNetwork::new();
    let node = Node::new(addr(MASTER_PORT));
    let cluster = Cluster::new(&node, &network);
    cluster.join(&node.address().to_string()).await.unwrap();
    let mediator = Mediator::with_failures(&node, failures);
    let tracker = Arc::new(CountingTracker::default());
    let (tx, rx) = unbounded_channel();
    let master = MasterCoordinator::new(config, mediator.clone(), tracker.clone())
      .with_cluster(cluster.clone())
      .with_listener(LocalRef::from(tx))
      .spawn(&node);
    Fleet {
      network: network,
      node: node,
      cluster: cluster,
      mediator: mediator,
      tracker: tracker,
      master: master,
      outcomes: rx,
    }
  }

  pub fn conf(&self) -> Conf {
    Conf::with_master(self.node.address())
  }

  /// A fresh node on `port` with its own cluster instance, not yet joined.
  pub fn worker_env(&self, port: u16) -> (Node, WorkerEnv<Total>) {
    let node = Node::new(addr(port));
    let env = WorkerEnv {
      cluster: Cluster::new(&node, &self.network),
      mediator: self.mediator.clone(),
      tracker: self.tracker.clone(),
      master: None,
    };
    (node, env)
  }

  pub async fn next_outcome(&mut self) -> RoundOutcome<Total> {
    timeout(TIMEOUT, self.outcomes.recv())
      .await
      .expect("no round closed in time")
      .expect("master dropped its listener")
  }
}

/// Polls `check` until it holds, panicking after [`TIMEOUT`].
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
  F: FnMut() -> Fut,
  Fut: Future<Output = bool>,
{
  let polled = timeout(TIMEOUT, async {
    while !check().await {
      sleep(Duration::from_millis(10)).await;
    }
  })
  .await;
  if polled.is_err() {
    panic!("timed out waiting for {}", what);
  }
}

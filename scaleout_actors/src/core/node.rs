use crate::core::{run_single, Actor, ActorContext, Address, LocalRef};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::unbounded_channel;
use tokio::task::JoinHandle;

struct NodeState {
  address: Address,
  rt: Handle,
}

/// One process's actor host. Cheap to clone; every clone spawns onto the same runtime.
#[derive(Clone)]
pub struct Node {
  inner: Arc<NodeState>,
}
impl Node {
  /// Must be called from within a tokio runtime.
  pub fn new(address: Address) -> Node {
    Self::with_handle(address, Handle::current())
  }

  pub fn with_handle(address: Address, rt: Handle) -> Node {
    Node {
      inner: Arc::new(NodeState {
        address: address,
        rt: rt,
      }),
    }
  }

  pub fn address(&self) -> &Address {
    &self.inner.address
  }

  pub fn rt(&self) -> &Handle {
    &self.inner.rt
  }

  pub fn spawn<S, A>(&self, actor: A, name: String) -> LocalRef<S>
  where
    S: Send + 'static,
    A: Actor<S>,
  {
    self.spawn_watched(actor, name).0
  }

  /// Like [`spawn`](Node::spawn), but also hands back the actor's task so a supervisor can
  /// observe how it ended.
  pub fn spawn_watched<S, A>(
    &self,
    actor: A,
    name: String,
  ) -> (LocalRef<S>, JoinHandle<()>)
  where
    S: Send + 'static,
    A: Actor<S>,
  {
    let (tx, rx) = unbounded_channel();
    let ctx = ActorContext {
      tx: tx,
      name: name,
      node: self.clone(),
    };
    let local = ctx.local_interface::<S>();
    let handle = self.rt().spawn(run_single(actor, ctx, rx));
    (local, handle)
  }

  pub fn schedule_local_msg<T: Send + 'static>(
    &self,
    after: Duration,
    actor: LocalRef<T>,
    msg: T,
  ) -> JoinHandle<bool> {
    self.rt().spawn(async move {
      tokio::time::sleep(after).await;
      actor.send(msg)
    })
  }
}

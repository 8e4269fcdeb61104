use crate::core::{local_actor_msg_convert, ActorSignal, LocalActorMsg};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

pub struct LocalRef<T: Send + 'static> {
  pub(crate) func: Arc<dyn Fn(LocalActorMsg<T>) -> bool + Send + Sync>,
}
impl<T: Send + 'static> Clone for LocalRef<T> {
  fn clone(&self) -> Self {
    LocalRef {
      func: self.func.clone(),
    }
  }
}
impl<T: Send + 'static> LocalRef<T> {
  pub fn send(&self, item: T) -> bool {
    (&self.func)(LocalActorMsg::Msg(item))
  }

  pub fn signal(&self, sig: ActorSignal) -> bool {
    (&self.func)(LocalActorMsg::Signal(sig))
  }

  pub fn transform<I: Send + 'static>(&self) -> LocalRef<I>
  where
    T: From<I>,
  {
    let func = self.func.clone();
    LocalRef {
      func: Arc::new(move |x: LocalActorMsg<I>| {
        func(local_actor_msg_convert(x))
      }),
    }
  }
}
/// Feeds a plain channel. Signals are dropped, but still report whether the receiver is alive.
impl<T: Send + 'static> From<UnboundedSender<T>> for LocalRef<T> {
  fn from(sender: UnboundedSender<T>) -> Self {
    LocalRef {
      func: Arc::new(move |x: LocalActorMsg<T>| match x {
        LocalActorMsg::Msg(m) => sender.send(m).is_ok(),
        LocalActorMsg::Signal(_) => !sender.is_closed(),
      }),
    }
  }
}
impl<T: Send + 'static> Debug for LocalRef<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LocalRef")
      .field("Specific", &std::any::type_name::<T>())
      .finish()
  }
}

/// Names one subscription, so the holder can cancel it later.
#[derive(
  Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SubscriptionId(u64);
impl SubscriptionId {
  pub fn random() -> SubscriptionId {
    SubscriptionId(rand::thread_rng().gen())
  }
}
impl Display for SubscriptionId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{:016x}", self.0)
  }
}

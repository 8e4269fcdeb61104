use crate::core::{LocalRef, Node};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

#[async_trait]
pub trait Actor<Msg: Send + 'static>: Send + 'static {
  async fn pre_start(&mut self, _: &ActorContext<Msg>) {}
  async fn recv(&mut self, ctx: &ActorContext<Msg>, msg: Msg);
  async fn post_stop(&mut self, _: &ActorContext<Msg>) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActorSignal {
  Term,
}

pub enum LocalActorMsg<T> {
  Msg(T),
  Signal(ActorSignal),
}

pub(in crate::core) fn local_actor_msg_convert<S: From<I>, I>(
  msg: LocalActorMsg<I>,
) -> LocalActorMsg<S> {
  match msg {
    LocalActorMsg::Msg(s) => LocalActorMsg::Msg(S::from(s)),
    LocalActorMsg::Signal(s) => LocalActorMsg::Signal(s),
  }
}

pub struct ActorContext<Specific: Send + 'static> {
  pub tx: UnboundedSender<LocalActorMsg<Specific>>,
  pub name: String,
  pub node: Node,
}
impl<Specific: Send + 'static> ActorContext<Specific> {
  pub fn local_interface<T: Send + 'static>(&self) -> LocalRef<T>
  where
    Specific: From<T>,
  {
    let sender = self.tx.clone();
    LocalRef {
      func: Arc::new(move |x: LocalActorMsg<T>| {
        sender.send(local_actor_msg_convert(x)).is_ok()
      }),
    }
  }

  /// Ends the actor after the messages already in its mailbox. `post_stop` still runs.
  pub fn stop(&self) {
    let _ = self.tx.send(LocalActorMsg::Signal(ActorSignal::Term));
  }
}

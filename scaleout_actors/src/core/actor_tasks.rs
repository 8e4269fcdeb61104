use crate::core::{Actor, ActorContext, ActorSignal, LocalActorMsg};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::trace;

pub(in crate::core) async fn run_single<S, A>(
  mut actor: A,
  ctx: ActorContext<S>,
  mut rx: UnboundedReceiver<LocalActorMsg<S>>,
) where
  S: Send + 'static,
  A: Actor<S>,
{
  trace!(actor = %ctx.name, "starting");
  actor.pre_start(&ctx).await;
  // The context keeps a sender alive, so the mailbox only ends on Term.
  while let Some(msg) = rx.recv().await {
    match msg {
      LocalActorMsg::Msg(m) => actor.recv(&ctx, m).await,
      LocalActorMsg::Signal(ActorSignal::Term) => break,
    }
  }
  actor.post_stop(&ctx).await;
  trace!(actor = %ctx.name, "stopped");
}

//! Topic-based publish/subscribe between coordinators that do not know where each other live.
//!
//! A [`Mediator`] routes every message published on a [`Topic`] to all of that topic's
//! subscribers. Delivery is at-least-once per subscriber. There is no ordering across
//! subscribers, and a subscriber may see the same message twice. Receivers must be
//! idempotent.

mod mediator;

#[rustfmt::skip]
pub use {
  mediator::Mediator,
  mediator::Topic,
};

#[rustfmt::skip]
#[doc(hidden)]
pub use {
  mediator::MediatorMsg,
};

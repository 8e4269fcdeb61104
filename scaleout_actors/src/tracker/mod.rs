//! The availability ledger: which worker identities may currently be handed work.
//!
//! The core only ever registers, removes and lists identities through [`StateTracker`]; how
//! the ledger is stored is the implementation's business. [`InMemoryStateTracker`] keeps it in
//! process. A [`Registration`] ties one identity's entry to the lifetime of a worker instance.

mod in_memory;
mod registration;
mod state_tracker;

#[rustfmt::skip]
pub use {
  in_memory::InMemoryStateTracker,
  registration::Registration,
  state_tracker::SharedTracker,
  state_tracker::StateTracker,
};

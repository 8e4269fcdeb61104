//! Error taxonomy for the coordination core.
//!
//! Only [`JoinError`] ever reaches a launcher. [`ComputeFailure`] is turned into a restart by
//! the worker's supervisor, and [`TrackerError`] on removal is logged and swallowed. A round
//! that times out is not an error at all; see
//! [`RoundOutcome`](crate::coordination::RoundOutcome).

use crate::coordination::WorkerId;
#[cfg(test)]
use crate::core::Address;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
  #[error("missing `<protocol>://` prefix")]
  MissingProtocol,
  #[error("missing `<system>@` before the host")]
  MissingSystem,
  #[error("missing `:<port>` after the host")]
  MissingPort,
  #[error("empty {0}")]
  Empty(&'static str),
  #[error("invalid port `{0}`")]
  BadPort(String),
}

/// The cluster endpoint given to a worker could not be joined. Fatal to that startup attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinError {
  #[error("malformed cluster address `{url}`: {source}")]
  Malformed {
    url: String,
    #[source]
    source: AddressError,
  },
  #[error("no cluster node reachable at {address}")]
  Unreachable { address: String },
}

/// Anything that went wrong inside a worker's compute step.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComputeFailure {
  #[error("compute failed: {0}")]
  Failed(String),
  #[error("compute panicked: {0}")]
  Panicked(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackerError {
  #[error("worker {0} is not registered")]
  NotRegistered(WorkerId),
  #[error("state tracker is shut down")]
  ShutDown,
}

#[test]
fn test_join_error_display() {
  let err = JoinError::Malformed {
    url: "fleet".to_string(),
    source: AddressError::MissingProtocol,
  };
  assert_eq!(
    err.to_string(),
    "malformed cluster address `fleet`: missing `<protocol>://` prefix"
  );
  let addr = Address::new("scaleout", "fleet", "localhost", 2552);
  let err = JoinError::Unreachable {
    address: addr.to_string(),
  };
  assert_eq!(
    err.to_string(),
    "no cluster node reachable at scaleout://fleet@localhost:2552"
  );
}

//! Tools for exercising coordinators under the delivery guarantees they must tolerate.

mod failure_config;
mod logging;

#[rustfmt::skip]
pub use {
  failure_config::FailureConfig,
  logging::init_test_logging,
};

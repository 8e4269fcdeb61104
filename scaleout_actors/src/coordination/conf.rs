use crate::core::Address;
use crate::error::AddressError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shipped to every worker. Only [`master_url`](#structfield.master_url) means
/// anything to the coordination core; the rest is handed to
/// [`Worker::setup`](crate::coordination::Worker::setup) untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conf {
  /// Sizes of the hidden layers.
  ///
  /// default: `[]`
  pub layer_sizes: Vec<usize>,
  /// default: `0`
  pub n_in: usize,
  /// default: `0`
  pub n_out: usize,
  /// default: `123`
  pub seed: u64,
  /// default: `0.01`
  pub pretrain_learning_rate: f64,
  /// default: `0.01`
  pub finetune_learning_rate: f64,
  /// default: `0.3`
  pub corruption_level: f64,
  /// default: `false`
  pub use_regularization: bool,
  /// default: `1`
  pub pretrain_epochs: u32,
  /// default: `1`
  pub finetune_epochs: u32,
  /// How often a worker should render its weights, in epochs. `0` never renders.
  ///
  /// default: `0`
  pub render_weight_epochs: u32,
  /// Algorithm-specific parameters with no fixed meaning here.
  ///
  /// default: `[]`
  pub extra_params: Vec<f64>,
  /// The cluster address of the node hosting the master, which workers join on startup.
  ///
  /// default: `"scaleout://fleet@127.0.0.1:2552"`
  pub master_url: String,
  /// The master actor's full path, for logging and lookup.
  ///
  /// default: `"scaleout://fleet@127.0.0.1:2552/user/master"`
  pub master_abs_path: String,
}
impl Default for Conf {
  fn default() -> Self {
    Conf {
      layer_sizes: vec![],
      n_in: 0,
      n_out: 0,
      seed: 123,
      pretrain_learning_rate: 0.01,
      finetune_learning_rate: 0.01,
      corruption_level: 0.3,
      use_regularization: false,
      pretrain_epochs: 1,
      finetune_epochs: 1,
      render_weight_epochs: 0,
      extra_params: vec![],
      master_url: "scaleout://fleet@127.0.0.1:2552".to_string(),
      master_abs_path: "scaleout://fleet@127.0.0.1:2552/user/master".to_string(),
    }
  }
}
impl Conf {
  pub fn with_master(address: &Address) -> Conf {
    Conf {
      master_url: address.to_string(),
      master_abs_path: format!("{}/user/master", address),
      ..Conf::default()
    }
  }

  pub fn master_address(&self) -> Result<Address, AddressError> {
    self.master_url.parse()
  }
}

/// Configures a [`MasterCoordinator`](crate::coordination::MasterCoordinator).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
  /// How long a round stays open for results. Workers that have not reported by then are
  /// evicted, and the round closes with what it has.
  ///
  /// default: `30 seconds`
  pub round_timeout: Duration,
  /// Stop the fleet after this many rounds. `None` runs until told to shut down.
  ///
  /// default: `None`
  pub max_rounds: Option<u64>,
  /// A round only opens once this many workers are expected. Values below `1` act as `1`.
  ///
  /// default: `1`
  pub min_workers: usize,
}
impl Default for MasterConfig {
  fn default() -> Self {
    MasterConfig {
      round_timeout: Duration::from_secs(30),
      max_rounds: None,
      min_workers: 1,
    }
  }
}

#[test]
fn test_conf_master_address() {
  let addr = Address::new("scaleout", "fleet", "10.1.1.1", 4000);
  let conf = Conf::with_master(&addr);
  assert_eq!(conf.master_address(), Ok(addr));
  assert_eq!(conf.master_abs_path, "scaleout://fleet@10.1.1.1:4000/user/master");
  let conf = Conf {
    master_url: "not-an-address".to_string(),
    ..Conf::default()
  };
  assert_eq!(conf.master_address(), Err(AddressError::MissingProtocol));
}

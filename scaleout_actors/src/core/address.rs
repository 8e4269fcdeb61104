use crate::error::AddressError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Where a node can be reached: `<protocol>://<system>@<host>:<port>`.
///
/// A trailing actor path (`/user/master`) is accepted when parsing and discarded; it names an
/// actor on the node, not the node itself.
#[derive(
  Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Address {
  pub protocol: String,
  pub system: String,
  pub host: String,
  pub port: u16,
}
impl Address {
  pub fn new(protocol: &str, system: &str, host: &str, port: u16) -> Address {
    Address {
      protocol: protocol.to_string(),
      system: system.to_string(),
      host: host.to_string(),
      port: port,
    }
  }
}
impl FromStr for Address {
  type Err = AddressError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    let (protocol, rest) =
      s.split_once("://").ok_or(AddressError::MissingProtocol)?;
    let (system, location) =
      rest.split_once('@').ok_or(AddressError::MissingSystem)?;
    let location = location.split('/').next().unwrap_or(location);
    let (host, port) =
      location.rsplit_once(':').ok_or(AddressError::MissingPort)?;
    for (part, value) in [("protocol", protocol), ("system", system), ("host", host)]
    {
      if value.is_empty() {
        return Err(AddressError::Empty(part));
      }
    }
    let port = port
      .parse::<u16>()
      .map_err(|_| AddressError::BadPort(port.to_string()))?;
    Ok(Address::new(protocol, system, host, port))
  }
}
impl Display for Address {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{}://{}@{}:{}",
      self.protocol, self.system, self.host, self.port
    )
  }
}

#[test]
fn test_address_parse() {
  let addr: Address = "scaleout://fleet@10.0.0.7:2552/user/master"
    .parse()
    .unwrap();
  assert_eq!(addr, Address::new("scaleout", "fleet", "10.0.0.7", 2552));
  assert_eq!(addr.to_string(), "scaleout://fleet@10.0.0.7:2552");
}

#[test]
fn test_address_parse_errors() {
  let cases = vec![
    ("fleet@localhost:2552", AddressError::MissingProtocol),
    ("scaleout://localhost:2552", AddressError::MissingSystem),
    ("scaleout://fleet@localhost", AddressError::MissingPort),
    ("scaleout://@localhost:2552", AddressError::Empty("system")),
    ("scaleout://fleet@:2552", AddressError::Empty("host")),
    (
      "scaleout://fleet@localhost:99999",
      AddressError::BadPort("99999".to_string()),
    ),
  ];
  for (url, expected) in cases {
    assert_eq!(url.parse::<Address>(), Err(expected), "{}", url);
  }
}

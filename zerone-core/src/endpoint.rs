//! `Endpoint` value type (spec.md §3).

use serde::{Deserialize, Serialize};

/// An addressable service instance: `{name, network, address, load}`.
///
/// `name` is unique per routing table, `network` is a lower-case transport
/// tag (e.g. `"tcp"`), `address` is `host:port`, `load` is an advisory
/// metric set by the provider side. Endpoints are value-typed and compared
/// structurally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    pub network: String,
    pub address: String,
    #[serde(default)]
    pub load: f64,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, network: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            network: network.into(),
            address: address.into(),
            load: 0.0,
        }
    }

    pub fn with_load(mut self, load: f64) -> Self {
        self.load = load;
        self
    }

    /// The connection-pool key: `"<network>://<address>"` (spec.md §3).
    pub fn pool_key(&self) -> String {
        format!("{}://{}", self.network, self.address)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pool_key_formats_network_and_address() {
        let ep = Endpoint::new("a", "tcp", "127.0.0.1:9000");
        assert_eq!(ep.pool_key(), "tcp://127.0.0.1:9000");
    }

    #[test]
    fn json_round_trips_through_registry_layout() {
        let ep = Endpoint::new("a", "tcp", "127.0.0.1:9000").with_load(0.5);
        let s = serde_json::to_string(&ep).unwrap();
        let back: Endpoint = serde_json::from_str(&s).unwrap();
        assert_eq!(ep, back);
    }
}

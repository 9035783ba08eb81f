//! Network identification and per-network connection parameters.
//!
//! The directory of known networks ships with builtin registry addresses and
//! can be overridden from the environment, so deployments can point the
//! local network at a freshly migrated registry without a rebuild.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// User-facing message shown when the environment reports a network we do
/// not have connection parameters for.
pub const UNSUPPORTED_NETWORK_MESSAGE: &str = "Please switch to either Main or Kovan network";

/// The networks the dashboard can operate against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NetworkId {
    Mainnet,
    Kovan,
    Local,
}

impl NetworkId {
    /// The chain id the environment reports for this network.
    pub fn chain_id(self) -> i64 {
        match self {
            NetworkId::Mainnet => 1,
            NetworkId::Kovan => 42,
            NetworkId::Local => 15,
        }
    }

    /// Map a reported chain id to a known network. Development environments
    /// report `-1` before a local chain id is assigned; both resolve to
    /// [`NetworkId::Local`].
    pub fn from_chain_id(chain_id: i64) -> Option<Self> {
        match chain_id {
            1 => Some(NetworkId::Mainnet),
            42 => Some(NetworkId::Kovan),
            -1 | 15 => Some(NetworkId::Local),
            _ => None,
        }
    }
}

impl std::fmt::Display for NetworkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NetworkId::Mainnet => "mainnet",
            NetworkId::Kovan => "kovan",
            NetworkId::Local => "local",
        };
        f.write_str(name)
    }
}

/// Connection parameters for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Address of the token registry contract on that network.
    pub registry_address: String,
}

/// Static map from network to connection parameters.
#[derive(Debug, Clone)]
pub struct NetworkDirectory {
    configs: BTreeMap<NetworkId, NetworkConfig>,
}

impl NetworkDirectory {
    /// The registry addresses baked into the build.
    pub fn builtin() -> Self {
        let mut configs = BTreeMap::new();
        configs.insert(
            NetworkId::Mainnet,
            NetworkConfig {
                registry_address: "0xdfabf3e4793cd30affb47ab6fa4cf4eef26bbc27".to_string(),
            },
        );
        configs.insert(
            NetworkId::Kovan,
            NetworkConfig {
                registry_address: "0x5b215a7d39ee305ad28da29bf2f0425c6c2a00b3".to_string(),
            },
        );
        configs.insert(
            NetworkId::Local,
            NetworkConfig {
                registry_address: "0x9FBDa871d559710256a2502A2517b794B482Db40".to_string(),
            },
        );
        NetworkDirectory { configs }
    }

    /// Builtin directory with registry addresses overridden from the
    /// environment where set.
    ///
    /// Recognized variables: `TOKENDESK_MAINNET_REGISTRY`,
    /// `TOKENDESK_KOVAN_REGISTRY`, `TOKENDESK_LOCAL_REGISTRY`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut directory = Self::builtin();
        let overrides = [
            (NetworkId::Mainnet, "TOKENDESK_MAINNET_REGISTRY"),
            (NetworkId::Kovan, "TOKENDESK_KOVAN_REGISTRY"),
            (NetworkId::Local, "TOKENDESK_LOCAL_REGISTRY"),
        ];
        for (network, var) in overrides {
            match std::env::var(var) {
                Ok(address) => {
                    let config = directory
                        .configs
                        .get_mut(&network)
                        .with_context(|| format!("no builtin config for {network}"))?;
                    config.registry_address = address;
                }
                Err(std::env::VarError::NotPresent) => {}
                Err(err) => {
                    return Err(err).with_context(|| format!("reading {var}"));
                }
            }
        }
        Ok(directory)
    }

    pub fn get(&self, network: NetworkId) -> Option<&NetworkConfig> {
        self.configs.get(&network)
    }
}

impl Default for NetworkDirectory {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_round_trip() {
        for network in [NetworkId::Mainnet, NetworkId::Kovan, NetworkId::Local] {
            assert_eq!(NetworkId::from_chain_id(network.chain_id()), Some(network));
        }
    }

    #[test]
    fn test_development_sentinel_maps_to_local() {
        assert_eq!(NetworkId::from_chain_id(-1), Some(NetworkId::Local));
    }

    #[test]
    fn test_unknown_chain_id() {
        assert_eq!(NetworkId::from_chain_id(7), None);
        assert_eq!(NetworkId::from_chain_id(0), None);
    }

    #[test]
    fn test_builtin_directory_covers_all_networks() {
        let directory = NetworkDirectory::builtin();
        for network in [NetworkId::Mainnet, NetworkId::Kovan, NetworkId::Local] {
            let config = directory.get(network).unwrap();
            assert!(config.registry_address.starts_with("0x"));
        }
    }
}

//! Network identification and registry.
//!
//! This module maps human-readable network identifiers (e.g. `"bsc-testnet"`)
//! to the EIP-155 chain IDs and default settlement tokens the protocol signs
//! against. Applications assemble a [`NetworkRegistry`] from [`NetworkInfo`]
//! slices at startup; every lookup against an unregistered identifier is a
//! hard error so a typo in configuration can never silently select the wrong
//! chain.

use std::collections::HashMap;

use alloy_primitives::{Address, address};

/// A known network definition with its chain ID and default token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Human-readable network identifier (e.g. "bsc-testnet")
    pub name: &'static str,
    /// EIP-155 chain ID used in witness domains and authorization tuples
    pub chain_id: u64,
    /// Default ERC-20 settlement token on this network, if one is known
    pub default_token: Option<Address>,
}

/// Networks the protocol ships support for out of the box.
///
/// The default tokens are the canonical USDT deployments on each chain.
pub const KNOWN_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "bsc-testnet",
        chain_id: 97,
        default_token: Some(address!("0x337610d27c682E347C9cD60BD4b3b107C9d34dDd")),
    },
    NetworkInfo {
        name: "bsc-mainnet",
        chain_id: 56,
        default_token: Some(address!("0x55d398326f99059fF775485246999027B3197955")),
    },
];

/// Error returned when a network identifier has no registry entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown network: {0}")]
pub struct UnknownNetworkError(pub String);

/// Registry that maps network identifiers to [`NetworkInfo`] entries.
///
/// Built from one or more `&[NetworkInfo]` slices. This is the single source
/// of truth for network identifier lookups on both the client and server
/// sides of the protocol.
///
/// # Example
///
/// ```
/// use q402::networks::{KNOWN_NETWORKS, NetworkRegistry};
///
/// let registry = NetworkRegistry::from_networks(KNOWN_NETWORKS);
/// let info = registry.lookup("bsc-testnet").unwrap();
/// assert_eq!(info.chain_id, 97);
/// ```
#[derive(Debug, Clone)]
pub struct NetworkRegistry {
    by_name: HashMap<&'static str, NetworkInfo>,
}

impl NetworkRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
        }
    }

    /// Creates a registry pre-populated from a network info slice.
    #[must_use]
    pub fn from_networks(networks: &[NetworkInfo]) -> Self {
        let mut registry = Self {
            by_name: HashMap::with_capacity(networks.len()),
        };
        registry.register(networks);
        registry
    }

    /// Registers additional networks into this registry.
    ///
    /// Re-registering an identifier replaces the previous entry.
    pub fn register(&mut self, networks: &[NetworkInfo]) {
        for info in networks {
            self.by_name.insert(info.name, *info);
        }
    }

    /// Builder-style method: registers additional networks and returns `self`.
    #[must_use]
    pub fn with_networks(mut self, networks: &[NetworkInfo]) -> Self {
        self.register(networks);
        self
    }

    /// Looks up a network by its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownNetworkError`] if the identifier is not registered.
    pub fn lookup(&self, name: &str) -> Result<&NetworkInfo, UnknownNetworkError> {
        self.by_name
            .get(name)
            .ok_or_else(|| UnknownNetworkError(name.to_owned()))
    }

    /// Returns the number of registered networks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns `true` if no networks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::from_networks(KNOWN_NETWORKS)
    }
}

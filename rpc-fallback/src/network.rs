//! Canonical network table and identifier normalisation.
//!
//! The [`NetworkRegistry`] is built once and never mutated afterwards. Every other
//! component references networks through a [`NetworkDescriptor`] obtained from
//! [`NetworkRegistry::normalize`], never through a raw chain id or name.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A resolved network: numeric chain id plus canonical name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    /// EIP-155 chain id. `0` for [`UNSPECIFIED`].
    #[serde(alias = "chainId")]
    pub chain_id: u64,
    /// Canonical network name.
    pub name: Cow<'static, str>,
}

impl NetworkDescriptor {
    /// Creates a descriptor with a static name.
    #[must_use]
    pub const fn new_static(chain_id: u64, name: &'static str) -> Self {
        Self {
            chain_id,
            name: Cow::Borrowed(name),
        }
    }

    /// Creates an ad-hoc descriptor, e.g. for a local devnet.
    #[must_use]
    pub fn new(chain_id: u64, name: impl Into<String>) -> Self {
        Self {
            chain_id,
            name: Cow::Owned(name.into()),
        }
    }

    /// Returns `true` for the [`UNSPECIFIED`] sentinel.
    #[must_use]
    pub fn is_unspecified(&self) -> bool {
        *self == UNSPECIFIED
    }
}

impl fmt::Display for NetworkDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.chain_id)
    }
}

/// Sentinel returned for well-formed but unregistered identifiers.
pub const UNSPECIFIED: NetworkDescriptor = NetworkDescriptor::new_static(0, "unspecified");
/// Ethereum mainnet.
pub const HOMESTEAD: NetworkDescriptor = NetworkDescriptor::new_static(1, "homestead");
/// Ropsten testnet.
pub const ROPSTEN: NetworkDescriptor = NetworkDescriptor::new_static(3, "ropsten");
/// Rinkeby testnet.
pub const RINKEBY: NetworkDescriptor = NetworkDescriptor::new_static(4, "rinkeby");
/// Goerli testnet.
pub const GOERLI: NetworkDescriptor = NetworkDescriptor::new_static(5, "goerli");
/// Optimism mainnet.
pub const OPTIMISM: NetworkDescriptor = NetworkDescriptor::new_static(10, "optimism");
/// Kovan testnet.
pub const KOVAN: NetworkDescriptor = NetworkDescriptor::new_static(42, "kovan");
/// BNB Smart Chain mainnet.
pub const BNB: NetworkDescriptor = NetworkDescriptor::new_static(56, "bnb");
/// Ethereum Classic.
pub const CLASSIC: NetworkDescriptor = NetworkDescriptor::new_static(61, "classic");
/// BNB Smart Chain testnet.
pub const BNBT: NetworkDescriptor = NetworkDescriptor::new_static(97, "bnbt");
/// Polygon mainnet.
pub const MATIC: NetworkDescriptor = NetworkDescriptor::new_static(137, "matic");
/// Arbitrum One.
pub const ARBITRUM: NetworkDescriptor = NetworkDescriptor::new_static(42161, "arbitrum");
/// Polygon Mumbai testnet.
pub const MATICMUM: NetworkDescriptor = NetworkDescriptor::new_static(80001, "maticmum");
/// Sepolia testnet.
pub const SEPOLIA: NetworkDescriptor = NetworkDescriptor::new_static(11_155_111, "sepolia");

/// Built-in networks with their name aliases.
const BUILTIN_NETWORKS: &[(NetworkDescriptor, &[&str])] = &[
    (HOMESTEAD, &["mainnet", "ethereum"]),
    (ROPSTEN, &[]),
    (RINKEBY, &[]),
    (GOERLI, &[]),
    (OPTIMISM, &[]),
    (KOVAN, &[]),
    (BNB, &["bsc", "binance"]),
    (CLASSIC, &[]),
    (BNBT, &["bsc-testnet", "binance-testnet"]),
    (MATIC, &["polygon"]),
    (ARBITRUM, &[]),
    (MATICMUM, &["mumbai"]),
    (SEPOLIA, &[]),
];

const BINANCE_MEMBERS: &[NetworkDescriptor] = &[BNB, BNBT];
const ETHEREUM_MEMBERS: &[NetworkDescriptor] =
    &[HOMESTEAD, ROPSTEN, RINKEBY, GOERLI, KOVAN, SEPOLIA];

static BUILTIN: Lazy<NetworkRegistry> =
    Lazy::new(|| NetworkRegistry::from_entries(BUILTIN_NETWORKS));

/// Network families with dedicated backend tables or default policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkFamily {
    /// BNB Smart Chain mainnet and testnet.
    Binance,
    /// Ethereum mainnet and its public testnets.
    Ethereum,
}

impl NetworkFamily {
    /// Descriptors belonging to this family.
    #[must_use]
    pub const fn members(self) -> &'static [NetworkDescriptor] {
        match self {
            Self::Binance => BINANCE_MEMBERS,
            Self::Ethereum => ETHEREUM_MEMBERS,
        }
    }
}

/// Caller-supplied network identifier, normalised by [`NetworkRegistry::normalize`].
///
/// Deserialised untagged: an integer is a chain id, a string a name, and a table
/// with `chain_id` and `name` an already-resolved descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NetworkIdentifier {
    /// Numeric chain id.
    ChainId(u64),
    /// Network name or alias.
    Name(String),
    /// Explicit descriptor, passed through unchanged.
    Descriptor(NetworkDescriptor),
}

impl From<u64> for NetworkIdentifier {
    fn from(chain_id: u64) -> Self {
        Self::ChainId(chain_id)
    }
}

impl From<&str> for NetworkIdentifier {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<NetworkDescriptor> for NetworkIdentifier {
    fn from(descriptor: NetworkDescriptor) -> Self {
        Self::Descriptor(descriptor)
    }
}

impl FromStr for NetworkIdentifier {
    type Err = std::convert::Infallible;

    /// All-digit strings are chain ids, anything else is a name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if !trimmed.is_empty()
            && trimmed.bytes().all(|b| b.is_ascii_digit())
            && let Ok(chain_id) = trimmed.parse()
        {
            return Ok(Self::ChainId(chain_id));
        }
        Ok(Self::Name(s.to_owned()))
    }
}

/// Immutable lookup table of canonical networks.
#[derive(Debug, Clone)]
pub struct NetworkRegistry {
    by_chain_id: HashMap<u64, NetworkDescriptor>,
    by_name: HashMap<String, NetworkDescriptor>,
}

impl NetworkRegistry {
    /// The process-wide built-in registry, initialised on first use.
    #[must_use]
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// Builds a registry from `(descriptor, aliases)` entries.
    ///
    /// Names are matched case-insensitively.
    #[must_use]
    pub fn from_entries(entries: &[(NetworkDescriptor, &[&str])]) -> Self {
        let mut by_chain_id = HashMap::with_capacity(entries.len());
        let mut by_name = HashMap::with_capacity(entries.len() * 2);
        for (descriptor, aliases) in entries {
            by_chain_id.insert(descriptor.chain_id, descriptor.clone());
            by_name.insert(descriptor.name.to_ascii_lowercase(), descriptor.clone());
            for alias in *aliases {
                by_name.insert(alias.to_ascii_lowercase(), descriptor.clone());
            }
        }
        Self { by_chain_id, by_name }
    }

    /// Normalises an identifier to exactly one descriptor.
    ///
    /// Unregistered but well-formed ids and names yield [`UNSPECIFIED`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNetwork`] when the identifier is absent, an empty
    /// name, or a descriptor without a name.
    pub fn normalize(
        &self,
        identifier: Option<&NetworkIdentifier>,
    ) -> Result<NetworkDescriptor, Error> {
        let identifier =
            identifier.ok_or_else(|| Error::InvalidNetwork("no network given".to_owned()))?;
        match identifier {
            NetworkIdentifier::Descriptor(descriptor) => {
                if descriptor.name.trim().is_empty() {
                    return Err(Error::InvalidNetwork(format!(
                        "descriptor for chain id {} has an empty name",
                        descriptor.chain_id
                    )));
                }
                Ok(descriptor.clone())
            }
            NetworkIdentifier::ChainId(chain_id) => Ok(self
                .by_chain_id
                .get(chain_id)
                .cloned()
                .unwrap_or_else(|| {
                    tracing::debug!(chain_id, "unregistered chain id, using unspecified network");
                    UNSPECIFIED
                })),
            NetworkIdentifier::Name(name) => {
                let key = name.trim();
                if key.is_empty() {
                    return Err(Error::InvalidNetwork("empty network name".to_owned()));
                }
                Ok(self
                    .by_name
                    .get(&key.to_ascii_lowercase())
                    .cloned()
                    .unwrap_or_else(|| {
                        tracing::debug!(
                            name = key,
                            "unregistered network name, using unspecified network"
                        );
                        UNSPECIFIED
                    }))
            }
        }
    }

    /// Looks up a registered network by chain id.
    #[must_use]
    pub fn by_chain_id(&self, chain_id: u64) -> Option<&NetworkDescriptor> {
        self.by_chain_id.get(&chain_id)
    }

    /// Exact membership test against the family's descriptor set.
    #[must_use]
    pub fn is_family_member(&self, descriptor: &NetworkDescriptor, family: NetworkFamily) -> bool {
        family.members().contains(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent_for_registered_networks() {
        let registry = NetworkRegistry::builtin();
        for (descriptor, aliases) in BUILTIN_NETWORKS {
            let mut identifiers = vec![
                NetworkIdentifier::ChainId(descriptor.chain_id),
                NetworkIdentifier::Name(descriptor.name.to_string()),
            ];
            identifiers.extend(aliases.iter().map(|a| NetworkIdentifier::from(*a)));
            for identifier in identifiers {
                let once = registry.normalize(Some(&identifier)).unwrap();
                let twice = registry.normalize(Some(&once.clone().into())).unwrap();
                assert_eq!(once, *descriptor);
                assert_eq!(once, twice);
            }
        }
    }

    #[test]
    fn missing_or_empty_identifiers_are_invalid() {
        let registry = NetworkRegistry::builtin();
        assert!(matches!(registry.normalize(None), Err(Error::InvalidNetwork(_))));
        assert!(matches!(
            registry.normalize(Some(&"  ".into())),
            Err(Error::InvalidNetwork(_))
        ));
        assert!(matches!(
            registry.normalize(Some(&NetworkDescriptor::new(5, "").into())),
            Err(Error::InvalidNetwork(_))
        ));
    }

    #[test]
    fn unregistered_identifiers_yield_unspecified() {
        let registry = NetworkRegistry::builtin();
        assert_eq!(registry.normalize(Some(&31337.into())).unwrap(), UNSPECIFIED);
        assert_eq!(registry.normalize(Some(&"hardhat".into())).unwrap(), UNSPECIFIED);
    }

    #[test]
    fn ad_hoc_descriptors_pass_through() {
        let registry = NetworkRegistry::builtin();
        let devnet = NetworkDescriptor::new(31337, "hardhat");
        assert_eq!(registry.normalize(Some(&devnet.clone().into())).unwrap(), devnet);
    }

    #[test]
    fn names_and_aliases_are_case_insensitive() {
        let registry = NetworkRegistry::builtin();
        assert_eq!(registry.normalize(Some(&"BSC".into())).unwrap(), BNB);
        assert_eq!(registry.normalize(Some(&"Mainnet".into())).unwrap(), HOMESTEAD);
    }

    #[test]
    fn family_membership_is_exact() {
        let registry = NetworkRegistry::builtin();
        assert!(registry.is_family_member(&BNBT, NetworkFamily::Binance));
        let chapel = NetworkDescriptor::new(97, "chapel");
        assert!(!registry.is_family_member(&chapel, NetworkFamily::Binance));
        assert!(!registry.is_family_member(&HOMESTEAD, NetworkFamily::Binance));
        assert!(registry.is_family_member(&GOERLI, NetworkFamily::Ethereum));
    }

    #[test]
    fn identifiers_parse_from_cli_strings() {
        assert_eq!("97".parse::<NetworkIdentifier>().unwrap(), NetworkIdentifier::ChainId(97));
        assert_eq!(
            "bnbt".parse::<NetworkIdentifier>().unwrap(),
            NetworkIdentifier::Name("bnbt".to_owned())
        );
    }

    #[test]
    fn identifiers_deserialize_untagged() {
        #[derive(Deserialize)]
        struct Doc {
            a: NetworkIdentifier,
            b: NetworkIdentifier,
            c: NetworkIdentifier,
        }
        let doc: Doc = toml::from_str(
            r#"
            a = 56
            b = "goerli"
            c = { chainId = 31337, name = "hardhat" }
            "#,
        )
        .unwrap();
        assert_eq!(doc.a, NetworkIdentifier::ChainId(56));
        assert_eq!(doc.b, NetworkIdentifier::Name("goerli".to_owned()));
        assert_eq!(doc.c, NetworkDescriptor::new(31337, "hardhat").into());
    }
}

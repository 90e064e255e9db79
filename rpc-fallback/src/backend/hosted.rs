//! Keyed hosted-node adapters: Infura, Alchemy and Ankr.
//!
//! Each one places its key as the last path segment of a per-network host, so
//! the community check compares that segment against the shared key.

use super::{
    BackendAdapter, BackendKind, ConnectionDescriptor, keyed_url, last_path_segment, non_blank,
    secret_credentials,
};
use crate::config::InfuraCredential;
use crate::error::Error;
use crate::network::NetworkDescriptor;

/// Shared Infura project id used when the caller supplies none.
pub const INFURA_COMMUNITY_PROJECT_ID: &str = "84842078b09946638c03157f83405213";
/// Shared Alchemy key used when the caller supplies none.
pub const ALCHEMY_COMMUNITY_KEY: &str = "_gg7wSSi0KMBsdKnGVfHDueq6xMB9EkC";
/// Shared Ankr key used when the caller supplies none.
pub const ANKR_COMMUNITY_KEY: &str =
    "9f7d929b018cdffb338517efa06f58359e86ff1ffd350bc889738523659e7972";

/// Infura hosted node.
#[derive(Debug, Clone, Copy, Default)]
pub struct Infura;

/// Alchemy hosted node.
#[derive(Debug, Clone, Copy, Default)]
pub struct Alchemy;

/// Ankr public RPC.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ankr;

fn infura_host(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        1 => Some("mainnet"),
        3 => Some("ropsten"),
        4 => Some("rinkeby"),
        5 => Some("goerli"),
        10 => Some("optimism-mainnet"),
        42 => Some("kovan"),
        137 => Some("polygon-mainnet"),
        42161 => Some("arbitrum-mainnet"),
        80001 => Some("polygon-mumbai"),
        11_155_111 => Some("sepolia"),
        _ => None,
    }
}

fn alchemy_host(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        1 => Some("eth-mainnet"),
        5 => Some("eth-goerli"),
        10 => Some("opt-mainnet"),
        137 => Some("polygon-mainnet"),
        42161 => Some("arb-mainnet"),
        80001 => Some("polygon-mumbai"),
        11_155_111 => Some("eth-sepolia"),
        _ => None,
    }
}

fn ankr_segment(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        1 => Some("eth"),
        5 => Some("eth_goerli"),
        10 => Some("optimism"),
        56 => Some("bsc"),
        97 => Some("bsc_testnet_chapel"),
        137 => Some("polygon"),
        42161 => Some("arbitrum"),
        80001 => Some("polygon_mumbai"),
        _ => None,
    }
}

fn key_is(connection: &ConnectionDescriptor, shared: &str) -> bool {
    last_path_segment(&connection.url).as_deref() == Some(shared)
}

impl BackendAdapter for Infura {
    type Credential = InfuraCredential;

    fn kind(&self) -> BackendKind {
        BackendKind::Infura
    }

    fn build_connection(
        &self,
        network: &NetworkDescriptor,
        credential: Option<&InfuraCredential>,
    ) -> Result<ConnectionDescriptor, Error> {
        let host = infura_host(network.chain_id)
            .ok_or_else(|| Error::unsupported(self.kind().as_str(), network))?;

        let (project_id, secret) = match credential {
            None => (INFURA_COMMUNITY_PROJECT_ID, None),
            Some(InfuraCredential::ProjectId(id)) => (
                non_blank(Some(id.as_str())).unwrap_or(INFURA_COMMUNITY_PROJECT_ID),
                None,
            ),
            Some(InfuraCredential::Options(options)) => {
                let id = non_blank(Some(options.project_id.as_str())).ok_or_else(|| {
                    Error::credential(self.kind().as_str(), "project_id must not be empty")
                })?;
                (id, options.project_secret.as_deref())
            }
        };

        let url = keyed_url(&format!("https://{host}.infura.io/v3"), project_id);
        Ok(ConnectionDescriptor::new(url).with_credentials(secret_credentials(secret)))
    }

    fn is_community_resource(&self, connection: &ConnectionDescriptor) -> bool {
        key_is(connection, INFURA_COMMUNITY_PROJECT_ID)
    }
}

impl BackendAdapter for Alchemy {
    type Credential = str;

    fn kind(&self) -> BackendKind {
        BackendKind::Alchemy
    }

    fn build_connection(
        &self,
        network: &NetworkDescriptor,
        credential: Option<&str>,
    ) -> Result<ConnectionDescriptor, Error> {
        let host = alchemy_host(network.chain_id)
            .ok_or_else(|| Error::unsupported(self.kind().as_str(), network))?;
        let key = non_blank(credential).unwrap_or(ALCHEMY_COMMUNITY_KEY);
        Ok(ConnectionDescriptor::new(keyed_url(
            &format!("https://{host}.g.alchemy.com/v2"),
            key,
        )))
    }

    fn is_community_resource(&self, connection: &ConnectionDescriptor) -> bool {
        key_is(connection, ALCHEMY_COMMUNITY_KEY)
    }
}

impl BackendAdapter for Ankr {
    type Credential = str;

    fn kind(&self) -> BackendKind {
        BackendKind::Ankr
    }

    fn build_connection(
        &self,
        network: &NetworkDescriptor,
        credential: Option<&str>,
    ) -> Result<ConnectionDescriptor, Error> {
        let segment = ankr_segment(network.chain_id)
            .ok_or_else(|| Error::unsupported(self.kind().as_str(), network))?;
        let key = non_blank(credential).unwrap_or(ANKR_COMMUNITY_KEY);
        Ok(ConnectionDescriptor::new(keyed_url(
            &format!("https://rpc.ankr.com/{segment}"),
            key,
        )))
    }

    fn is_community_resource(&self, connection: &ConnectionDescriptor) -> bool {
        key_is(connection, ANKR_COMMUNITY_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InfuraOptions;
    use crate::network::{ARBITRUM, BNB, BNBT, GOERLI, HOMESTEAD, SEPOLIA};

    #[test]
    fn infura_project_secret_becomes_basic_auth() {
        let credential = InfuraCredential::Options(InfuraOptions {
            project_id: "abc".to_owned(),
            project_secret: Some("shh".to_owned()),
        });
        let connection = Infura.build_connection(&SEPOLIA, Some(&credential)).unwrap();
        assert_eq!(connection.url, "https://sepolia.infura.io/v3/abc");
        assert_eq!(connection.credentials.as_deref(), Some(":shh"));
        assert!(!Infura.is_community_resource(&connection));
    }

    #[test]
    fn infura_defaults_to_shared_project() {
        let connection = Infura.build_connection(&HOMESTEAD, None).unwrap();
        assert_eq!(
            connection.url,
            format!("https://mainnet.infura.io/v3/{INFURA_COMMUNITY_PROJECT_ID}")
        );
        assert!(Infura.is_community_resource(&connection));
        assert!(Infura.build_connection(&BNB, None).unwrap_err().is_unsupported_network());
    }

    #[test]
    fn infura_rejects_empty_structured_project_id() {
        let credential = InfuraCredential::Options(InfuraOptions {
            project_id: " ".to_owned(),
            project_secret: None,
        });
        assert!(matches!(
            Infura.build_connection(&GOERLI, Some(&credential)),
            Err(Error::InvalidCredential { .. })
        ));
    }

    #[test]
    fn alchemy_key_is_last_segment() {
        let connection = Alchemy.build_connection(&ARBITRUM, Some("mine")).unwrap();
        assert_eq!(connection.url, "https://arb-mainnet.g.alchemy.com/v2/mine");
        assert!(!Alchemy.is_community_resource(&connection));
        let shared = Alchemy.build_connection(&GOERLI, Some("")).unwrap();
        assert!(Alchemy.is_community_resource(&shared));
    }

    #[test]
    fn ankr_serves_binance_family() {
        let connection = Ankr.build_connection(&BNBT, None).unwrap();
        assert_eq!(
            connection.url,
            format!("https://rpc.ankr.com/bsc_testnet_chapel/{ANKR_COMMUNITY_KEY}")
        );
        assert!(Ankr.is_community_resource(&connection));
        let keyed = Ankr.build_connection(&BNB, Some("k")).unwrap();
        assert_eq!(keyed.url, "https://rpc.ankr.com/bsc/k");
        assert!(Ankr.build_connection(&SEPOLIA, None).unwrap_err().is_unsupported_network());
    }
}

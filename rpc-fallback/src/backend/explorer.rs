//! Etherscan-compatible explorer adapters.
//!
//! The api key travels as the `apikey` query parameter of the descriptor URL, so
//! the community check only has to read it back.

use url::Url;

use super::{BackendAdapter, BackendKind, ConnectionDescriptor, Transport, non_blank};
use crate::error::Error;
use crate::network::NetworkDescriptor;

/// Shared Etherscan key used when the caller supplies none.
pub const ETHERSCAN_COMMUNITY_KEY: &str = "9D13ZE7XSBTJ94N9BNJ2MA33VMAY2YPIRB";
/// Shared `BscScan` key used when the caller supplies none.
pub const BSCSCAN_COMMUNITY_KEY: &str = "EVTS3CU31AATZV72YQ55TPGXGMVIFUQ9M9";

/// Etherscan: Ethereum mainnet and public testnets.
#[derive(Debug, Clone, Default)]
pub struct Etherscan {
    base_url: Option<String>,
}

/// `BscScan`: BNB Smart Chain mainnet and testnet.
#[derive(Debug, Clone, Default)]
pub struct Bscscan {
    base_url: Option<String>,
}

impl Etherscan {
    /// Sends requests to `base_url` instead of the public API host. The network must
    /// still be one Etherscan serves.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
        }
    }
}

impl Bscscan {
    /// Sends requests to `base_url` instead of the public API host. The network must
    /// still be one `BscScan` serves.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
        }
    }
}

fn etherscan_base(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        1 => Some("https://api.etherscan.io/api"),
        3 => Some("https://api-ropsten.etherscan.io/api"),
        4 => Some("https://api-rinkeby.etherscan.io/api"),
        5 => Some("https://api-goerli.etherscan.io/api"),
        42 => Some("https://api-kovan.etherscan.io/api"),
        11_155_111 => Some("https://api-sepolia.etherscan.io/api"),
        _ => None,
    }
}

fn bscscan_base(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        56 => Some("https://api.bscscan.com/api"),
        97 => Some("https://api-testnet.bscscan.com/api"),
        _ => None,
    }
}

fn explorer_connection(
    kind: BackendKind,
    base: Option<&str>,
    override_url: Option<&str>,
    network: &NetworkDescriptor,
    key: &str,
) -> Result<ConnectionDescriptor, Error> {
    let base = base.ok_or_else(|| Error::unsupported(kind.as_str(), network))?;
    let base = override_url.unwrap_or(base);
    let mut url = Url::parse(base).map_err(|e| Error::credential(kind.as_str(), e.to_string()))?;
    url.query_pairs_mut().append_pair("apikey", key);
    Ok(ConnectionDescriptor::new(url))
}

fn api_key(connection: &ConnectionDescriptor) -> Option<String> {
    let url = Url::parse(&connection.url).ok()?;
    url.query_pairs()
        .find(|(name, _)| name == "apikey")
        .map(|(_, value)| value.into_owned())
}

impl BackendAdapter for Etherscan {
    type Credential = str;

    fn kind(&self) -> BackendKind {
        BackendKind::Etherscan
    }

    fn build_connection(
        &self,
        network: &NetworkDescriptor,
        credential: Option<&str>,
    ) -> Result<ConnectionDescriptor, Error> {
        let key = non_blank(credential).unwrap_or(ETHERSCAN_COMMUNITY_KEY);
        explorer_connection(
            self.kind(),
            etherscan_base(network.chain_id),
            self.base_url.as_deref(),
            network,
            key,
        )
    }

    fn is_community_resource(&self, connection: &ConnectionDescriptor) -> bool {
        api_key(connection).as_deref() == Some(ETHERSCAN_COMMUNITY_KEY)
    }

    fn transport(&self) -> Transport {
        Transport::ExplorerProxy
    }
}

impl BackendAdapter for Bscscan {
    type Credential = str;

    fn kind(&self) -> BackendKind {
        BackendKind::Bscscan
    }

    fn build_connection(
        &self,
        network: &NetworkDescriptor,
        credential: Option<&str>,
    ) -> Result<ConnectionDescriptor, Error> {
        let key = non_blank(credential).unwrap_or(BSCSCAN_COMMUNITY_KEY);
        explorer_connection(
            self.kind(),
            bscscan_base(network.chain_id),
            self.base_url.as_deref(),
            network,
            key,
        )
    }

    fn is_community_resource(&self, connection: &ConnectionDescriptor) -> bool {
        api_key(connection).as_deref() == Some(BSCSCAN_COMMUNITY_KEY)
    }

    fn transport(&self) -> Transport {
        Transport::ExplorerProxy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{BNB, BNBT, GOERLI, HOMESTEAD, MATIC};

    #[test]
    fn bscscan_selects_mainnet_or_testnet_host() {
        let mainnet = Bscscan::default().build_connection(&BNB, Some("key")).unwrap();
        assert_eq!(mainnet.url, "https://api.bscscan.com/api?apikey=key");
        let testnet = Bscscan::default().build_connection(&BNBT, Some("key")).unwrap();
        assert_eq!(testnet.url, "https://api-testnet.bscscan.com/api?apikey=key");
    }

    #[test]
    fn shared_key_marks_community_resource() {
        let bscscan = Bscscan::default();
        let shared = bscscan.build_connection(&BNBT, None).unwrap();
        assert!(bscscan.is_community_resource(&shared));
        let blank = bscscan.build_connection(&BNBT, Some("  ")).unwrap();
        assert!(bscscan.is_community_resource(&blank));
        let own = bscscan.build_connection(&BNBT, Some("mine")).unwrap();
        assert!(!bscscan.is_community_resource(&own));
    }

    #[test]
    fn unsupported_networks_are_rejected() {
        let unsupported = |result: Result<ConnectionDescriptor, Error>| {
            result.unwrap_err().is_unsupported_network()
        };
        assert!(unsupported(Bscscan::default().build_connection(&HOMESTEAD, None)));
        assert!(unsupported(Etherscan::default().build_connection(&BNB, None)));
        assert!(unsupported(Etherscan::default().build_connection(&MATIC, None)));
    }

    #[test]
    fn etherscan_covers_testnets() {
        let goerli = Etherscan::default().build_connection(&GOERLI, None).unwrap();
        assert!(goerli.url.starts_with("https://api-goerli.etherscan.io/api?apikey="));
        assert!(Etherscan::default().is_community_resource(&goerli));
    }

    #[test]
    fn base_url_override_keeps_network_check_and_key() {
        let local = Bscscan::with_base_url("http://127.0.0.1:9000/api");
        let connection = local.build_connection(&BNBT, Some("key")).unwrap();
        assert_eq!(connection.url, "http://127.0.0.1:9000/api?apikey=key");
        assert!(!local.is_community_resource(&connection));
        assert!(local.build_connection(&HOMESTEAD, None).unwrap_err().is_unsupported_network());
    }
}

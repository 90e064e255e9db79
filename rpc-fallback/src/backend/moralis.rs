//! Moralis region-keyed speedy-node adapter.

use super::{BackendAdapter, BackendKind, ConnectionDescriptor, keyed_url, non_blank};
use crate::config::MoralisCredential;
use crate::error::Error;
use crate::network::{NetworkDescriptor, NetworkFamily};

/// Region used when the credential names none.
pub const DEFAULT_REGION: &str = "nyc";

/// Moralis speedy node. Always requires a caller-supplied api key.
#[derive(Debug, Clone, Copy, Default)]
pub struct Moralis;

fn binance_segment(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        56 => Some("bsc/mainnet"),
        97 => Some("bsc/testnet"),
        _ => None,
    }
}

fn ethereum_segment(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        1 => Some("eth/mainnet"),
        3 => Some("eth/ropsten"),
        4 => Some("eth/rinkeby"),
        5 => Some("eth/goerli"),
        42 => Some("eth/kovan"),
        _ => None,
    }
}

/// Network path segment from the family table the network belongs to.
fn network_segment(network: &NetworkDescriptor) -> Option<&'static str> {
    if NetworkFamily::Binance.members().contains(network) {
        binance_segment(network.chain_id)
    } else {
        ethereum_segment(network.chain_id)
    }
}

/// `https://speedy-nodes-<region>.moralis.io`
fn region_host(region: &str) -> Result<String, Error> {
    let valid = !region.is_empty()
        && region
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if !valid {
        return Err(Error::credential(
            BackendKind::Moralis.as_str(),
            format!("invalid region '{region}'"),
        ));
    }
    Ok(format!("https://speedy-nodes-{region}.moralis.io"))
}

impl BackendAdapter for Moralis {
    type Credential = MoralisCredential;

    fn kind(&self) -> BackendKind {
        BackendKind::Moralis
    }

    fn build_connection(
        &self,
        network: &NetworkDescriptor,
        credential: Option<&MoralisCredential>,
    ) -> Result<ConnectionDescriptor, Error> {
        let (api_key, region) = match credential {
            None => (None, None),
            Some(MoralisCredential::ApiKey(key)) => (Some(key.as_str()), None),
            Some(MoralisCredential::Options(options)) => {
                (Some(options.api_key.as_str()), options.region.as_deref())
            }
        };
        let api_key = non_blank(api_key)
            .ok_or_else(|| Error::credential(self.kind().as_str(), "api key is required"))?;
        let region = non_blank(region).unwrap_or(DEFAULT_REGION);

        let segment = network_segment(network)
            .ok_or_else(|| Error::unsupported(self.kind().as_str(), network))?;
        let url = format!("{}/{segment}", keyed_url(&region_host(region)?, api_key));
        Ok(ConnectionDescriptor::new(url))
    }

    fn is_community_resource(&self, _connection: &ConnectionDescriptor) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MoralisOptions;
    use crate::network::{BNB, BNBT, GOERLI, MATIC};

    #[test]
    fn builds_region_templated_url() {
        let credential = MoralisCredential::Options(MoralisOptions {
            api_key: "key".to_owned(),
            region: Some("fra".to_owned()),
        });
        let connection = Moralis.build_connection(&BNB, Some(&credential)).unwrap();
        assert_eq!(connection.url, "https://speedy-nodes-fra.moralis.io/key/bsc/mainnet");
    }

    #[test]
    fn region_defaults_to_nyc() {
        let credential = MoralisCredential::ApiKey("key".to_owned());
        let connection = Moralis.build_connection(&BNBT, Some(&credential)).unwrap();
        assert_eq!(connection.url, "https://speedy-nodes-nyc.moralis.io/key/bsc/testnet");
        let goerli = Moralis.build_connection(&GOERLI, Some(&credential)).unwrap();
        assert_eq!(goerli.url, "https://speedy-nodes-nyc.moralis.io/key/eth/goerli");
        assert!(!Moralis.is_community_resource(&goerli));
    }

    #[test]
    fn missing_or_empty_key_is_invalid() {
        assert!(matches!(
            Moralis.build_connection(&BNB, None),
            Err(Error::InvalidCredential { .. })
        ));
        let empty = MoralisCredential::ApiKey(String::new());
        assert!(matches!(
            Moralis.build_connection(&BNB, Some(&empty)),
            Err(Error::InvalidCredential { .. })
        ));
    }

    #[test]
    fn malformed_region_is_invalid() {
        let credential = MoralisCredential::Options(MoralisOptions {
            api_key: "key".to_owned(),
            region: Some("n/y".to_owned()),
        });
        assert!(matches!(
            Moralis.build_connection(&BNB, Some(&credential)),
            Err(Error::InvalidCredential { .. })
        ));
    }

    #[test]
    fn networks_outside_family_tables_are_unsupported() {
        let credential = MoralisCredential::ApiKey("key".to_owned());
        assert!(
            Moralis
                .build_connection(&MATIC, Some(&credential))
                .unwrap_err()
                .is_unsupported_network()
        );
    }
}

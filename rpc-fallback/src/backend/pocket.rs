//! Pocket Network gateway adapter.

use super::{
    BackendAdapter, BackendKind, ConnectionDescriptor, last_path_segment, non_blank,
    secret_credentials,
};
use crate::config::PocketCredential;
use crate::error::Error;
use crate::network::NetworkDescriptor;

/// Shared application id used when the caller supplies none.
pub const POCKET_COMMUNITY_APPLICATION_ID: &str = "62e1ad51b37b8e00394bda3b";

/// Pocket load-balanced gateway.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pocket;

fn gateway_host(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        1 => Some("eth-mainnet"),
        3 => Some("eth-ropsten"),
        4 => Some("eth-rinkeby"),
        5 => Some("eth-goerli"),
        56 => Some("bsc-mainnet"),
        97 => Some("bsc-testnet"),
        137 => Some("poly-mainnet"),
        80001 => Some("polygon-mumbai-rpc"),
        _ => None,
    }
}

impl BackendAdapter for Pocket {
    type Credential = PocketCredential;

    fn kind(&self) -> BackendKind {
        BackendKind::Pocket
    }

    fn build_connection(
        &self,
        network: &NetworkDescriptor,
        credential: Option<&PocketCredential>,
    ) -> Result<ConnectionDescriptor, Error> {
        let host = gateway_host(network.chain_id)
            .ok_or_else(|| Error::unsupported(self.kind().as_str(), network))?;

        let (application_id, secret, load_balancer) = match credential {
            None => (POCKET_COMMUNITY_APPLICATION_ID, None, true),
            Some(PocketCredential::ApplicationId(id)) => {
                let id = non_blank(Some(id.as_str())).unwrap_or(POCKET_COMMUNITY_APPLICATION_ID);
                (id, None, true)
            }
            Some(PocketCredential::Options(options)) => {
                let id = non_blank(Some(options.application_id.as_str())).ok_or_else(|| {
                    Error::credential(self.kind().as_str(), "application_id must not be empty")
                })?;
                (id, options.application_secret_key.as_deref(), options.load_balancer)
            }
        };

        let path = if load_balancer { "v1/lb" } else { "v1" };
        let url = format!("https://{host}.gateway.pokt.network/{path}/{application_id}");
        Ok(ConnectionDescriptor::new(url).with_credentials(secret_credentials(secret)))
    }

    fn is_community_resource(&self, connection: &ConnectionDescriptor) -> bool {
        last_path_segment(&connection.url).as_deref() == Some(POCKET_COMMUNITY_APPLICATION_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PocketOptions;
    use crate::network::{BNB, BNBT, OPTIMISM};

    #[test]
    fn defaults_to_shared_application_id() {
        let connection = Pocket.build_connection(&BNBT, None).unwrap();
        let expected =
            format!("https://bsc-testnet.gateway.pokt.network/v1/lb/{POCKET_COMMUNITY_APPLICATION_ID}");
        assert_eq!(connection.url, expected);
        assert_eq!(connection.credentials, None);
        assert!(Pocket.is_community_resource(&connection));
    }

    #[test]
    fn secret_becomes_basic_auth_password() {
        let credential = PocketCredential::Options(PocketOptions {
            application_id: "app".to_owned(),
            application_secret_key: Some("secret".to_owned()),
            load_balancer: true,
        });
        let connection = Pocket.build_connection(&BNB, Some(&credential)).unwrap();
        assert_eq!(connection.url, "https://bsc-mainnet.gateway.pokt.network/v1/lb/app");
        assert_eq!(connection.credentials.as_deref(), Some(":secret"));
        assert!(!Pocket.is_community_resource(&connection));
    }

    #[test]
    fn direct_gateway_path_without_load_balancer() {
        let credential = PocketCredential::Options(PocketOptions {
            application_id: "app".to_owned(),
            application_secret_key: None,
            load_balancer: false,
        });
        let connection = Pocket.build_connection(&BNB, Some(&credential)).unwrap();
        assert_eq!(connection.url, "https://bsc-mainnet.gateway.pokt.network/v1/app");
    }

    #[test]
    fn empty_structured_application_id_is_invalid() {
        let credential = PocketCredential::Options(PocketOptions {
            application_id: String::new(),
            application_secret_key: None,
            load_balancer: true,
        });
        assert!(matches!(
            Pocket.build_connection(&BNB, Some(&credential)),
            Err(Error::InvalidCredential { .. })
        ));
    }

    #[test]
    fn unknown_network_is_unsupported() {
        assert!(Pocket.build_connection(&OPTIMISM, None).unwrap_err().is_unsupported_network());
    }
}

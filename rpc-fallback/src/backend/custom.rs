//! Credential-free adapters: the Cloudflare gateway and caller-supplied endpoints.

use url::Url;

use super::{BackendAdapter, BackendKind, ConnectionDescriptor};
use crate::config::CustomEndpoint;
use crate::error::Error;
use crate::network::{HOMESTEAD, NetworkDescriptor};

const CLOUDFLARE_URL: &str = "https://cloudflare-eth.com/";

/// Cloudflare Ethereum gateway. Mainnet only.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cloudflare;

/// A caller-supplied JSON-RPC endpoint, used verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct Custom;

/// `custom(<origin>)`. Paths, queries and userinfo are left out since they often
/// carry keys.
pub(crate) fn custom_label(url: &str) -> String {
    let origin = Url::parse(url)
        .map(|url| url.origin().ascii_serialization())
        .unwrap_or_default();
    format!("custom({origin})")
}

impl BackendAdapter for Cloudflare {
    type Credential = ();

    fn kind(&self) -> BackendKind {
        BackendKind::Cloudflare
    }

    fn build_connection(
        &self,
        network: &NetworkDescriptor,
        _credential: Option<&()>,
    ) -> Result<ConnectionDescriptor, Error> {
        if *network != HOMESTEAD {
            return Err(Error::unsupported(self.kind().as_str(), network));
        }
        Ok(ConnectionDescriptor::new(CLOUDFLARE_URL))
    }

    // No key to swap in: every caller shares the same gateway.
    fn is_community_resource(&self, _connection: &ConnectionDescriptor) -> bool {
        true
    }
}

impl BackendAdapter for Custom {
    type Credential = CustomEndpoint;

    fn kind(&self) -> BackendKind {
        BackendKind::Custom
    }

    fn build_connection(
        &self,
        _network: &NetworkDescriptor,
        credential: Option<&CustomEndpoint>,
    ) -> Result<ConnectionDescriptor, Error> {
        let endpoint = credential
            .ok_or_else(|| Error::credential(self.kind().as_str(), "endpoint url is required"))?;
        let parsed = Url::parse(&endpoint.url).map_err(|e| {
            Error::credential(self.kind().as_str(), format!("invalid url '{}': {e}", endpoint.url))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::credential(
                self.kind().as_str(),
                format!("unsupported url scheme '{}'", parsed.scheme()),
            ));
        }
        Ok(ConnectionDescriptor::new(endpoint.url.clone()).with_headers(endpoint.headers.clone()))
    }

    fn is_community_resource(&self, _connection: &ConnectionDescriptor) -> bool {
        false
    }
}

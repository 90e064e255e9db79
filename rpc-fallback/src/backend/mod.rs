//! Backend adapters and live backend instances.
//!
//! - [`BackendAdapter`] — how one backend kind turns a network and credential into a
//!   [`ConnectionDescriptor`].
//! - [`BackendInstance`] — a live client bound to one descriptor, with a readiness
//!   probe and the read path.
//! - [`BackendSelection`] — a backend kind paired with the caller's credential, as
//!   planned by the provider factory.

mod custom;
mod explorer;
mod hosted;
mod moralis;
mod pocket;
mod transport;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub use self::custom::{Cloudflare, Custom};
pub(crate) use self::custom::custom_label;
pub use self::explorer::{Bscscan, Etherscan};
pub use self::hosted::{Alchemy, Ankr, Infura};
pub use self::moralis::Moralis;
pub use self::pocket::Pocket;
pub use self::transport::RpcCall;

use crate::config::{CustomEndpoint, InfuraCredential, MoralisCredential, PocketCredential};
use crate::error::Error;
use crate::network::NetworkDescriptor;

/// Every supported backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Etherscan explorer API.
    Etherscan,
    /// `BscScan` explorer API.
    Bscscan,
    /// Pocket load-balanced gateway.
    Pocket,
    /// Moralis region-keyed speedy node.
    Moralis,
    /// Infura hosted node.
    Infura,
    /// Alchemy hosted node.
    Alchemy,
    /// Ankr hosted node.
    Ankr,
    /// Cloudflare mainnet gateway.
    Cloudflare,
    /// Caller-supplied JSON-RPC endpoint.
    Custom,
}

impl BackendKind {
    /// Lowercase name used in labels and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Etherscan => "etherscan",
            Self::Bscscan => "bscscan",
            Self::Pocket => "pocket",
            Self::Moralis => "moralis",
            Self::Infura => "infura",
            Self::Alchemy => "alchemy",
            Self::Ankr => "ankr",
            Self::Cloudflare => "cloudflare",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to reach one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionDescriptor {
    /// Endpoint URL.
    pub url: String,
    /// Extra request headers, in deterministic order. Custom endpoints carry the
    /// caller's configured headers here.
    #[serde(skip_serializing)]
    pub headers: BTreeMap<String, String>,
    /// Basic-auth credentials as `user:password`.
    #[serde(skip_serializing)]
    pub credentials: Option<String>,
}

impl ConnectionDescriptor {
    /// Descriptor with no headers or credentials.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            credentials: None,
        }
    }

    /// Attaches extra request headers.
    #[must_use]
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Attaches basic-auth credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Option<String>) -> Self {
        self.credentials = credentials;
        self
    }
}

/// How requests reach a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// JSON-RPC 2.0 over HTTP POST.
    JsonRpc,
    /// Explorer `module=proxy` API over HTTP GET.
    ExplorerProxy,
}

/// One backend kind's connection-building rules.
pub trait BackendAdapter {
    /// Credential accepted by this backend.
    type Credential: ?Sized;

    /// Backend kind tag.
    fn kind(&self) -> BackendKind;

    /// Builds the connection descriptor for `network`.
    ///
    /// Identical inputs always produce identical descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedNetwork`] if the backend cannot serve `network`, or
    /// [`Error::InvalidCredential`] if a required credential is missing or malformed.
    fn build_connection(
        &self,
        network: &NetworkDescriptor,
        credential: Option<&Self::Credential>,
    ) -> Result<ConnectionDescriptor, Error>;

    /// Whether `connection` uses the shared, community rate-limited credential.
    fn is_community_resource(&self, connection: &ConnectionDescriptor) -> bool;

    /// Request transport for this backend.
    fn transport(&self) -> Transport {
        Transport::JsonRpc
    }
}

/// Requests are sent with these shared settings.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// HTTP client, shared by every instance of one resolution.
    pub client: Client,
    /// Finite readiness probe timeout.
    pub probe_timeout: Duration,
}

/// A live client bound to one [`ConnectionDescriptor`].
#[derive(Debug, Clone)]
pub struct BackendInstance {
    kind: BackendKind,
    network: NetworkDescriptor,
    connection: ConnectionDescriptor,
    transport: Transport,
    community: bool,
    client: Client,
    probe_timeout: Duration,
}

impl BackendInstance {
    /// Builds an instance through `adapter`.
    ///
    /// # Errors
    ///
    /// Propagates the adapter's [`BackendAdapter::build_connection`] errors.
    pub fn connect<A: BackendAdapter>(
        adapter: &A,
        network: &NetworkDescriptor,
        credential: Option<&A::Credential>,
        options: &ConnectOptions,
    ) -> Result<Self, Error> {
        let connection = adapter.build_connection(network, credential)?;
        let community = adapter.is_community_resource(&connection);
        tracing::debug!(
            backend = %adapter.kind(),
            network = %network,
            community,
            "backend instance created"
        );
        Ok(Self {
            kind: adapter.kind(),
            network: network.clone(),
            connection,
            transport: adapter.transport(),
            community,
            client: options.client.clone(),
            probe_timeout: options.probe_timeout,
        })
    }

    /// Backend kind tag.
    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Network this instance serves.
    #[must_use]
    pub const fn network(&self) -> &NetworkDescriptor {
        &self.network
    }

    /// Connection descriptor.
    #[must_use]
    pub const fn connection(&self) -> &ConnectionDescriptor {
        &self.connection
    }

    /// Request transport.
    #[must_use]
    pub const fn transport(&self) -> Transport {
        self.transport
    }

    /// Whether this instance uses the shared community credential rather than a
    /// caller-supplied one.
    #[must_use]
    pub const fn is_community_resource(&self) -> bool {
        self.community
    }

    /// Human-readable label for errors and logs, e.g. `pocket(bnbt)`. Custom
    /// endpoints are labelled by origin only.
    #[must_use]
    pub fn label(&self) -> String {
        match self.kind {
            BackendKind::Custom => custom_label(&self.connection.url),
            kind => format!("{kind}({})", self.network.name),
        }
    }

    /// Sends one read request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Request`] on network, HTTP, decode, or RPC errors.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, Error> {
        transport::send(self, &RpcCall::new(method, params)).await
    }

    /// Sends several read requests in one round trip where the transport allows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Request`] if the batch or any call in it fails.
    pub async fn request_batch(&self, calls: &[RpcCall]) -> Result<Vec<Value>, Error> {
        transport::send_batch(self, calls).await
    }

    /// Probes the backend until it answers, the probe timeout elapses, or `cancel`
    /// fires.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnreachable`] naming this backend.
    pub async fn wait_until_ready(&self, cancel: &CancellationToken) -> Result<(), Error> {
        let probe = tokio::time::timeout(self.probe_timeout, transport::probe(self));
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                Err(Error::unreachable(self.label(), "readiness probe cancelled"))
            }
            outcome = probe => match outcome {
                Ok(Ok(())) => {
                    tracing::debug!(backend = %self.label(), "backend ready");
                    Ok(())
                }
                Ok(Err(e)) => Err(Error::unreachable(self.label(), probe_reason(e))),
                Err(_) => Err(Error::unreachable(
                    self.label(),
                    format!(
                        "readiness probe timed out after {}ms",
                        self.probe_timeout.as_millis()
                    ),
                )),
            },
        }
    }

    pub(crate) const fn client(&self) -> &Client {
        &self.client
    }
}

fn probe_reason(error: Error) -> String {
    match error {
        Error::Request { reason, .. } | Error::BackendUnreachable { reason, .. } => reason,
        other => other.to_string(),
    }
}

/// A backend kind paired with the caller's credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSelection {
    /// Etherscan, shared key when `None`.
    Etherscan(Option<String>),
    /// `BscScan`, shared key when `None`.
    Bscscan(Option<String>),
    /// Pocket, shared application id when `None`.
    Pocket(Option<PocketCredential>),
    /// Moralis; always keyed.
    Moralis(MoralisCredential),
    /// Infura, shared project id when `None`.
    Infura(Option<InfuraCredential>),
    /// Alchemy, shared key when `None`.
    Alchemy(Option<String>),
    /// Ankr, shared key when `None`.
    Ankr(Option<String>),
    /// Cloudflare mainnet gateway.
    Cloudflare,
    /// Caller-supplied endpoint.
    Custom(CustomEndpoint),
}

impl BackendSelection {
    /// Backend kind tag.
    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        match self {
            Self::Etherscan(_) => BackendKind::Etherscan,
            Self::Bscscan(_) => BackendKind::Bscscan,
            Self::Pocket(_) => BackendKind::Pocket,
            Self::Moralis(_) => BackendKind::Moralis,
            Self::Infura(_) => BackendKind::Infura,
            Self::Alchemy(_) => BackendKind::Alchemy,
            Self::Ankr(_) => BackendKind::Ankr,
            Self::Cloudflare => BackendKind::Cloudflare,
            Self::Custom(_) => BackendKind::Custom,
        }
    }

    /// Instantiates the selected backend for `network`.
    ///
    /// # Errors
    ///
    /// Propagates adapter errors.
    pub fn connect(
        &self,
        network: &NetworkDescriptor,
        options: &ConnectOptions,
    ) -> Result<BackendInstance, Error> {
        match self {
            Self::Etherscan(key) => {
                BackendInstance::connect(&Etherscan::default(), network, key.as_deref(), options)
            }
            Self::Bscscan(key) => {
                BackendInstance::connect(&Bscscan::default(), network, key.as_deref(), options)
            }
            Self::Pocket(credential) => {
                BackendInstance::connect(&Pocket, network, credential.as_ref(), options)
            }
            Self::Moralis(credential) => {
                BackendInstance::connect(&Moralis, network, Some(credential), options)
            }
            Self::Infura(credential) => {
                BackendInstance::connect(&Infura, network, credential.as_ref(), options)
            }
            Self::Alchemy(key) => {
                BackendInstance::connect(&Alchemy, network, key.as_deref(), options)
            }
            Self::Ankr(key) => BackendInstance::connect(&Ankr, network, key.as_deref(), options),
            Self::Cloudflare => BackendInstance::connect(&Cloudflare, network, None, options),
            Self::Custom(endpoint) => {
                BackendInstance::connect(&Custom, network, Some(endpoint), options)
            }
        }
    }
}

/// Treats blank credentials as absent.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Appends `key` as the final path segment of `base`.
fn keyed_url(base: &str, key: &str) -> String {
    format!("{}/{key}", base.trim_end_matches('/'))
}

/// Basic-auth credentials with an empty username and `secret` as password.
fn secret_credentials(secret: Option<&str>) -> Option<String> {
    non_blank(secret).map(|secret| format!(":{secret}"))
}

/// Last path segment of `url`, if any.
fn last_path_segment(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_owned)
}

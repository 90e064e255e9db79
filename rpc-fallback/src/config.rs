//! Provider configuration, credential types, and TOML loading.
//!
//! This module provides:
//!
//! - [`ProviderConfig`] — one provider resolution request: target network, backend
//!   credentials, quorum and readiness options.
//! - [`ProvidersConfig`] — the `[[providers]]` list of a configuration file.
//! - [`load_config`] — reads a TOML file, substituting `$VAR` / `${VAR}` references.
//! - [`generate_default_config`] — produces a commented TOML template.
//!
//! # Configuration File Format
//!
//! ```toml
//! [[providers]]
//! token = "bsc"
//! network = "bnbt"
//! bscscan = "$BSCSCAN_API_KEY"
//! moralis = { api_key = "${MORALIS_API_KEY}", region = "fra" }
//!
//! [[providers]]
//! token = "local"
//! network = { chain_id = 31337, name = "hardhat" }
//! use_default_provider = false
//! custom = [{ url = "http://127.0.0.1:8545" }]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;
use crate::network::NetworkIdentifier;

/// Pocket gateway credential: a bare application id or full options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PocketCredential {
    /// Application id only.
    ApplicationId(String),
    /// Application id with optional secret and gateway mode.
    Options(PocketOptions),
}

/// Structured Pocket credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PocketOptions {
    /// Portal application id.
    pub application_id: String,
    /// Optional application secret, sent as basic-auth password.
    #[serde(default)]
    pub application_secret_key: Option<String>,
    /// Route through the load-balanced gateway path (default: true).
    #[serde(default = "default_true")]
    pub load_balancer: bool,
}

/// Moralis speedy-node credential: a bare api key or key plus region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MoralisCredential {
    /// Api key, default region.
    ApiKey(String),
    /// Api key with explicit region.
    Options(MoralisOptions),
}

/// Structured Moralis credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoralisOptions {
    /// Speedy-node api key.
    pub api_key: String,
    /// Node region (default: `nyc`).
    #[serde(default)]
    pub region: Option<String>,
}

/// Infura credential: a bare project id or id plus secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InfuraCredential {
    /// Project id only.
    ProjectId(String),
    /// Project id with optional secret.
    Options(InfuraOptions),
}

/// Structured Infura credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfuraOptions {
    /// Project id.
    pub project_id: String,
    /// Optional project secret, sent as basic-auth password.
    #[serde(default)]
    pub project_secret: Option<String>,
}

/// A caller-supplied JSON-RPC endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomEndpoint {
    /// HTTP(S) JSON-RPC URL, used verbatim.
    pub url: String,
    /// Network served by the endpoint. Inherits the target network when absent.
    #[serde(default)]
    pub network: Option<NetworkIdentifier>,
    /// Extra request headers, e.g. an `Authorization` header for a private node.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl CustomEndpoint {
    /// Endpoint for `url` on the target network.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            network: None,
            headers: BTreeMap::new(),
        }
    }

    /// Adds a request header sent with every call to this endpoint.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the network this endpoint serves.
    #[must_use]
    pub fn with_network(mut self, network: impl Into<NetworkIdentifier>) -> Self {
        self.network = Some(network.into());
        self
    }
}

/// One provider resolution request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Opaque key used by the host to pick among several providers.
    #[serde(default)]
    pub token: Option<String>,
    /// Target network.
    #[serde(default)]
    pub network: Option<NetworkIdentifier>,
    /// Use the network-family default bundle (default: true).
    #[serde(default = "default_true")]
    pub use_default_provider: bool,
    /// Etherscan api key.
    #[serde(default)]
    pub etherscan: Option<String>,
    /// `BscScan` api key.
    #[serde(default)]
    pub bscscan: Option<String>,
    /// Pocket gateway credential.
    #[serde(default)]
    pub pocket: Option<PocketCredential>,
    /// Moralis speedy-node credential.
    #[serde(default)]
    pub moralis: Option<MoralisCredential>,
    /// Infura credential.
    #[serde(default)]
    pub infura: Option<InfuraCredential>,
    /// Alchemy api key.
    #[serde(default)]
    pub alchemy: Option<String>,
    /// Ankr api key.
    #[serde(default)]
    pub ankr: Option<String>,
    /// Include the Cloudflare mainnet gateway.
    #[serde(default)]
    pub cloudflare: Option<bool>,
    /// Custom JSON-RPC endpoints, one table or a list.
    #[serde(default, deserialize_with = "one_or_many")]
    pub custom: Vec<CustomEndpoint>,
    /// Fallback quorum override.
    #[serde(default)]
    pub quorum: Option<u32>,
    /// Probe every backend before returning (default: true).
    #[serde(default = "default_true")]
    pub wait_until_is_connected: bool,
    /// Readiness probe timeout in seconds (default: 10).
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            token: None,
            network: None,
            use_default_provider: true,
            etherscan: None,
            bscscan: None,
            pocket: None,
            moralis: None,
            infura: None,
            alchemy: None,
            ankr: None,
            cloudflare: None,
            custom: Vec::new(),
            quorum: None,
            wait_until_is_connected: true,
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl ProviderConfig {
    /// Configuration targeting `network` with every other option at its default.
    #[must_use]
    pub fn for_network(network: impl Into<NetworkIdentifier>) -> Self {
        Self {
            network: Some(network.into()),
            ..Self::default()
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_probe_timeout() -> u64 {
    10
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<CustomEndpoint>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(CustomEndpoint),
        Many(Vec<CustomEndpoint>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(endpoint) => vec![endpoint],
        OneOrMany::Many(endpoints) => endpoints,
    })
}

/// The `[[providers]]` list of a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Provider entries in file order.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl ProvidersConfig {
    /// Selects the entry keyed by `token`, or the first entry when `token` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no entry matches.
    pub fn select(&self, token: Option<&str>) -> Result<&ProviderConfig, Error> {
        let found = match token {
            Some(token) => self
                .providers
                .iter()
                .find(|p| p.token.as_deref() == Some(token)),
            None => self.providers.first(),
        };
        found.ok_or_else(|| match token {
            Some(token) => Error::config(format!("no provider with token '{token}'")),
            None => Error::config("no [[providers]] entries configured"),
        })
    }
}

/// Resolve an environment-variable reference (`$VAR` or `${VAR}`), returning
/// the literal string unchanged if it does not match either pattern.
fn resolve_env(value: &str) -> Result<String, Error> {
    let braced = value.strip_prefix("${").and_then(|v| v.strip_suffix('}'));
    let var_name = braced.or_else(|| {
        value.strip_prefix('$').filter(|name| {
            !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
        })
    });
    match var_name {
        Some(name) => std::env::var(name).map_err(|_| {
            Error::config(format!("env var '{name}' not found (referenced as '{value}')"))
        }),
        None => Ok(value.to_owned()),
    }
}

/// Replace every `$VAR` string in the document with its environment value.
fn resolve_env_references(value: &mut toml::Value) -> Result<(), Error> {
    match value {
        toml::Value::String(s) => *s = resolve_env(s)?,
        toml::Value::Array(items) => {
            for item in items {
                resolve_env_references(item)?;
            }
        }
        toml::Value::Table(table) => {
            for (_, item) in table.iter_mut() {
                resolve_env_references(item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Parse configuration from TOML text, substituting environment references.
///
/// # Errors
///
/// Returns [`Error::Config`] on TOML syntax errors, missing environment
/// variables, or values that do not match the schema.
pub fn parse_config(content: &str) -> Result<ProvidersConfig, Error> {
    let table: toml::Table =
        toml::from_str(content).map_err(|e| Error::config_with("failed to parse TOML", e))?;
    let mut doc = toml::Value::Table(table);
    resolve_env_references(&mut doc)?;
    doc.try_into()
        .map_err(|e| Error::config_with("invalid provider configuration", e))
}

/// Load configuration from a TOML file at the given path.
///
/// # Errors
///
/// Returns an error if the file cannot be resolved, read, or parsed.
pub fn load_config(path: &Path) -> Result<ProvidersConfig, Error> {
    let config_path = path.canonicalize().map_err(|e| {
        Error::config_with(format!("failed to resolve config path '{}'", path.display()), e)
    })?;
    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        Error::config_with(format!("failed to read config file '{}'", config_path.display()), e)
    })?;
    let config = parse_config(&content)?;
    tracing::debug!(
        path = %config_path.display(),
        providers = config.providers.len(),
        "configuration loaded"
    );
    Ok(config)
}

/// Generate a default TOML configuration template.
#[must_use]
pub fn generate_default_config() -> String {
    String::from(
        r#"# rpc-fallback configuration
#
# Each [[providers]] entry resolves to one read provider.
# Values support environment variable references: "$VAR" or "${VAR}".

# ── BNB Smart Chain testnet, family default ───────────────────────────
# BscScan + Pocket, plus Moralis when a key is given. Quorum defaults to 2.

[[providers]]
token = "bsc"
network = "bnbt"
# bscscan = "$BSCSCAN_API_KEY"
# pocket = { application_id = "$POCKET_APP_ID", application_secret_key = "$POCKET_SECRET" }
# moralis = { api_key = "$MORALIS_API_KEY", region = "nyc" }

# ── Ethereum mainnet, explicit backends only ──────────────────────────

[[providers]]
token = "mainnet"
network = "homestead"
use_default_provider = false
cloudflare = true
# etherscan = "$ETHERSCAN_API_KEY"
# infura = { project_id = "$INFURA_PROJECT_ID", project_secret = "$INFURA_SECRET" }
# alchemy = "$ALCHEMY_API_KEY"
# quorum = 1

# ── Local devnet ──────────────────────────────────────────────────────

[[providers]]
token = "local"
network = { chain_id = 31337, name = "hardhat" }
use_default_provider = false
custom = [{ url = "http://127.0.0.1:8545" }]
# custom = [{ url = "https://node.internal/rpc", headers = { "x-api-key" = "$NODE_API_KEY" } }]
# wait_until_is_connected = true
# probe_timeout_secs = 10
"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkDescriptor;

    #[test]
    fn default_template_parses() {
        let config = parse_config(&generate_default_config()).unwrap();
        assert_eq!(config.providers.len(), 3);
        let local = config.select(Some("local")).unwrap();
        assert!(!local.use_default_provider);
        assert_eq!(local.custom, vec![CustomEndpoint::new("http://127.0.0.1:8545")]);
        assert_eq!(
            local.network,
            Some(NetworkDescriptor::new(31337, "hardhat").into())
        );
        assert_eq!(config.select(None).unwrap().token.as_deref(), Some("bsc"));
    }

    #[test]
    fn defaults_apply_to_sparse_entries() {
        let config = parse_config("[[providers]]\nnetwork = 97\n").unwrap();
        let entry = config.select(None).unwrap();
        assert!(entry.use_default_provider);
        assert!(entry.wait_until_is_connected);
        assert_eq!(entry.probe_timeout_secs, 10);
        assert!(entry.custom.is_empty());
    }

    #[test]
    fn credentials_accept_string_or_table() {
        let config = parse_config(
            r#"
            [[providers]]
            pocket = "app"
            moralis = { api_key = "key" }
            infura = { project_id = "id", project_secret = "secret" }
            custom = { url = "http://localhost:8545", network = "goerli" }
            "#,
        )
        .unwrap();
        let entry = &config.providers[0];
        assert_eq!(entry.pocket, Some(PocketCredential::ApplicationId("app".to_owned())));
        assert_eq!(
            entry.moralis,
            Some(MoralisCredential::Options(MoralisOptions {
                api_key: "key".to_owned(),
                region: None,
            }))
        );
        assert_eq!(
            entry.infura,
            Some(InfuraCredential::Options(InfuraOptions {
                project_id: "id".to_owned(),
                project_secret: Some("secret".to_owned()),
            }))
        );
        assert_eq!(
            entry.custom,
            vec![CustomEndpoint::new("http://localhost:8545").with_network("goerli")]
        );
    }

    #[test]
    fn custom_headers_are_read_and_substituted() {
        unsafe {
            std::env::set_var("RPC_FALLBACK_TEST_NODE_KEY", "node-secret");
        }
        let config = parse_config(
            r#"
            [[providers]]
            network = "goerli"

            [providers.custom]
            url = "https://node.internal/rpc"
            headers = { "x-api-key" = "$RPC_FALLBACK_TEST_NODE_KEY" }
            "#,
        )
        .unwrap();
        assert_eq!(
            config.providers[0].custom,
            vec![
                CustomEndpoint::new("https://node.internal/rpc")
                    .with_header("x-api-key", "node-secret")
            ]
        );
    }

    #[test]
    fn env_references_are_substituted() {
        // Unique names keep parallel tests from observing each other.
        unsafe {
            std::env::set_var("RPC_FALLBACK_TEST_BSCSCAN", "from-env");
        }
        let config = parse_config(
            r#"
            [[providers]]
            bscscan = "$RPC_FALLBACK_TEST_BSCSCAN"
            moralis = { api_key = "${RPC_FALLBACK_TEST_BSCSCAN}" }
            alchemy = "literal$"
            "#,
        )
        .unwrap();
        let entry = &config.providers[0];
        assert_eq!(entry.bscscan.as_deref(), Some("from-env"));
        assert_eq!(
            entry.moralis,
            Some(MoralisCredential::Options(MoralisOptions {
                api_key: "from-env".to_owned(),
                region: None,
            }))
        );
        assert_eq!(entry.alchemy.as_deref(), Some("literal$"));
    }

    #[test]
    fn missing_env_reference_is_a_config_error() {
        let err = parse_config("[[providers]]\netherscan = \"$RPC_FALLBACK_TEST_UNSET_VAR\"\n")
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("RPC_FALLBACK_TEST_UNSET_VAR")));
    }

    #[test]
    fn select_reports_unknown_token() {
        let config = ProvidersConfig::default();
        assert!(matches!(config.select(Some("nope")), Err(Error::Config(_))));
        assert!(matches!(config.select(None), Err(Error::Config(_))));
    }
}

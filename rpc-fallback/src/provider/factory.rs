//! Provider resolution: plan, instantiate, wait for readiness, compose.

use std::time::Duration;

use futures::future::join_all;
use reqwest::{Client, ClientBuilder};
use tokio_util::sync::CancellationToken;

use super::ResolvedProvider;
use super::policy::{BackendPlan, DefaultPolicy, explicit_plan};
use crate::backend::{BackendInstance, BackendSelection, ConnectOptions, custom_label};
use crate::config::{CustomEndpoint, ProviderConfig};
use crate::error::Error;
use crate::network::{NetworkDescriptor, NetworkIdentifier, NetworkRegistry};

/// Builds [`ResolvedProvider`]s against one network registry and one HTTP client.
#[derive(Debug, Clone)]
pub struct ProviderFactory<'r> {
    registry: &'r NetworkRegistry,
    client: Client,
}

impl ProviderFactory<'static> {
    /// Factory over the built-in registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, Error> {
        Self::with_registry(NetworkRegistry::builtin())
    }
}

impl<'r> ProviderFactory<'r> {
    /// Factory over `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be built.
    pub fn with_registry(registry: &'r NetworkRegistry) -> Result<Self, Error> {
        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(30))
            .use_rustls_tls()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config_with("failed to build http client", e))?;
        Ok(Self { registry, client })
    }

    /// Replaces the HTTP client shared by every backend this factory creates.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Registry used for normalisation and family membership.
    #[must_use]
    pub const fn registry(&self) -> &'r NetworkRegistry {
        self.registry
    }

    /// Normalises `config.network`, then resolves.
    ///
    /// # Errors
    ///
    /// See [`Self::resolve_with_cancel`].
    pub async fn resolve_config(&self, config: &ProviderConfig) -> Result<ResolvedProvider, Error> {
        let network = self.registry.normalize(config.network.as_ref())?;
        self.resolve(&network, config).await
    }

    /// Resolves `config` for `network`, without external cancellation.
    ///
    /// # Errors
    ///
    /// See [`Self::resolve_with_cancel`].
    pub async fn resolve(
        &self,
        network: &NetworkDescriptor,
        config: &ProviderConfig,
    ) -> Result<ResolvedProvider, Error> {
        self.resolve_with_cancel(network, config, &CancellationToken::new())
            .await
    }

    /// Resolves `config` for `network`. Cancelling `cancel` aborts every readiness
    /// probe still in flight.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedNetwork`] / [`Error::InvalidCredential`] from a planned
    ///   backend that cannot be built.
    /// - [`Error::BackendUnreachable`] naming every backend whose probe failed.
    /// - [`Error::NoProviderConfigured`] if nothing was planned.
    /// - [`Error::InvalidQuorum`] if the quorum override does not fit.
    pub async fn resolve_with_cancel(
        &self,
        network: &NetworkDescriptor,
        config: &ProviderConfig,
        cancel: &CancellationToken,
    ) -> Result<ResolvedProvider, Error> {
        let plan = if config.use_default_provider {
            DefaultPolicy::for_network(self.registry, network).plan(network, config)
        } else {
            explicit_plan(network, config)?
        };
        self.build(network, config, &plan, cancel).await
    }

    /// Resolves the network-family default bundle, regardless of
    /// `use_default_provider`.
    ///
    /// # Errors
    ///
    /// See [`Self::resolve_with_cancel`].
    pub async fn family_default(
        &self,
        network: &NetworkDescriptor,
        config: &ProviderConfig,
    ) -> Result<ResolvedProvider, Error> {
        let plan = DefaultPolicy::for_network(self.registry, network).plan(network, config);
        self.build(network, config, &plan, &CancellationToken::new())
            .await
    }

    async fn build(
        &self,
        network: &NetworkDescriptor,
        config: &ProviderConfig,
        plan: &BackendPlan,
        cancel: &CancellationToken,
    ) -> Result<ResolvedProvider, Error> {
        if config.probe_timeout_secs == 0 {
            return Err(Error::config("probe_timeout_secs must be at least 1"));
        }
        let options = ConnectOptions {
            client: self.client.clone(),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
        };

        let mut instances = Vec::with_capacity(plan.entries.len());
        for entry in &plan.entries {
            if let BackendSelection::Custom(endpoint) = &entry.selection {
                self.check_custom_network(network, endpoint)?;
            }
            match entry.selection.connect(network, &options) {
                Ok(instance) => instances.push(instance),
                Err(e) if entry.optional && e.is_unsupported_network() => {
                    tracing::debug!(
                        backend = %entry.selection.kind(),
                        network = %network,
                        "default backend skipped: network not served"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        if config.wait_until_is_connected {
            wait_until_ready(&instances, cancel).await?;
        }

        let quorum = config
            .quorum
            .unwrap_or_else(|| plan.default_quorum(instances.len()));
        let provider = ResolvedProvider::compose(network, instances, quorum)?;
        tracing::info!(
            network = %network,
            backends = provider.backends().count(),
            quorum = provider.quorum(),
            "provider resolved"
        );
        Ok(provider)
    }

    /// A custom entry naming a network must name the target's chain id. Names the
    /// registry does not know carry no chain id and are accepted.
    fn check_custom_network(
        &self,
        target: &NetworkDescriptor,
        endpoint: &CustomEndpoint,
    ) -> Result<(), Error> {
        let Some(identifier) = &endpoint.network else {
            return Ok(());
        };
        let chain_id = match identifier {
            NetworkIdentifier::ChainId(chain_id) => Some(*chain_id),
            other => {
                let descriptor = self.registry.normalize(Some(other))?;
                (!descriptor.is_unspecified()).then_some(descriptor.chain_id)
            }
        };
        match chain_id {
            Some(chain_id) if !target.is_unspecified() && chain_id != target.chain_id => {
                Err(Error::unsupported(custom_label(&endpoint.url), target))
            }
            _ => Ok(()),
        }
    }
}

/// Probes every instance concurrently. All failures are reported together.
async fn wait_until_ready(
    instances: &[BackendInstance],
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let outcomes = join_all(instances.iter().map(|i| i.wait_until_ready(cancel))).await;

    let mut backends = Vec::new();
    let mut reasons = Vec::new();
    for error in outcomes.into_iter().filter_map(Result::err) {
        match error {
            Error::BackendUnreachable { backend, reason } => {
                reasons.push(format!("{backend}: {reason}"));
                backends.push(backend);
            }
            other => reasons.push(other.to_string()),
        }
    }
    if reasons.is_empty() {
        return Ok(());
    }
    tracing::warn!(failed = reasons.len(), "readiness wait failed");
    Err(Error::unreachable(backends.join(", "), reasons.join("; ")))
}

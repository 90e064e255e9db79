//! RPC endpoint resolution and quorum fallback aggregation.
//!
//! Turns a declarative [`ProviderConfig`] into one logical read client: the
//! network identifier is normalised, one backend instance is built per configured
//! source (block explorers, hosted nodes, custom JSON-RPC URLs), every instance is
//! probed, and two or more are composed into a quorum-reconciled [`FallbackSet`].
//!
//! ```no_run
//! # async fn demo() -> Result<(), rpc_fallback::Error> {
//! use rpc_fallback::{MulticallProvider, ProviderConfig, resolve_provider};
//!
//! let provider = resolve_provider(&ProviderConfig::for_network("bnbt")).await?;
//! let block = MulticallProvider::wrap(provider)
//!     .request("eth_blockNumber", serde_json::Value::Null)
//!     .await?;
//! # let _ = block;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod multicall;
pub mod network;
pub mod provider;

pub use self::backend::{
    BackendAdapter, BackendInstance, BackendKind, ConnectionDescriptor, RpcCall,
};
pub use self::config::{ProviderConfig, ProvidersConfig, generate_default_config, load_config};
pub use self::error::Error;
pub use self::multicall::{MulticallBatch, MulticallProvider};
pub use self::network::{NetworkDescriptor, NetworkFamily, NetworkIdentifier, NetworkRegistry};
pub use self::provider::{FallbackSet, ProviderFactory, ResolvedProvider};

/// Resolves `config` with a factory over the built-in network registry.
///
/// # Errors
///
/// See [`ProviderFactory::resolve_with_cancel`].
pub async fn resolve_provider(config: &ProviderConfig) -> Result<ResolvedProvider, Error> {
    ProviderFactory::new()?.resolve_config(config).await
}

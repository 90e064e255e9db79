//! `rpc-fallback call` command: one read call through the resolved provider.

use rpc_fallback::{Error, MulticallProvider, ProviderFactory};
use serde_json::Value;

use super::Target;
use crate::signal::SigDown;

/// Execute the `call` command and print the JSON result.
///
/// # Errors
///
/// Returns an error if `params` is not a JSON array, resolution fails, or the
/// call fails on the provider.
#[allow(clippy::print_stdout)]
pub async fn run(
    target: &Target,
    method: &str,
    params: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let params: Value = serde_json::from_str(params)
        .map_err(|e| Error::config_with("params must be a JSON array", e))?;
    if !params.is_array() {
        return Err(Error::config(format!("params must be a JSON array, got {params}")).into());
    }

    let config = target.provider_config()?;
    let sig_down = SigDown::try_new()?;
    let factory = ProviderFactory::new()?;
    let network = factory.registry().normalize(config.network.as_ref())?;
    let provider = factory
        .resolve_with_cancel(&network, &config, &sig_down.cancellation_token())
        .await?;

    let multicall = MulticallProvider::wrap(provider);
    let result = multicall.request(method, params).await?;
    tracing::debug!(method, backends = multicall.inner().backends().count(), "call completed");
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

//! `rpc-fallback resolve` command: resolve a provider and print its summary.

use rpc_fallback::ProviderFactory;
use serde_json::json;

use super::Target;
use crate::signal::SigDown;

/// Execute the `resolve` command.
///
/// Ctrl-C cancels readiness probes still in flight.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or resolution fails.
#[allow(clippy::print_stdout)]
pub async fn run(target: &Target) -> Result<(), Box<dyn std::error::Error>> {
    let config = target.provider_config()?;
    let sig_down = SigDown::try_new()?;

    let factory = ProviderFactory::new()?;
    let network = factory.registry().normalize(config.network.as_ref())?;
    let provider = factory
        .resolve_with_cancel(&network, &config, &sig_down.cancellation_token())
        .await?;

    let report = json!({
        "token": config.token,
        "network": network,
        "provider": provider.summary(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

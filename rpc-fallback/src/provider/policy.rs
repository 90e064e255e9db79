//! Backend planning: the explicit list and the network-family defaults.

use crate::backend::BackendSelection;
use crate::config::ProviderConfig;
use crate::error::Error;
use crate::network::{HOMESTEAD, NetworkDescriptor, NetworkFamily, NetworkRegistry};

/// One planned backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedBackend {
    /// Backend kind and credential.
    pub selection: BackendSelection,
    /// Skipped, rather than failing the resolution, when the backend does not
    /// serve the network.
    pub optional: bool,
}

impl PlannedBackend {
    const fn required(selection: BackendSelection) -> Self {
        Self {
            selection,
            optional: false,
        }
    }

    const fn optional(selection: BackendSelection) -> Self {
        Self {
            selection,
            optional: true,
        }
    }
}

/// Ordered backends to instantiate, plus the policy that picks the default quorum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendPlan {
    /// Backends in priority order.
    pub entries: Vec<PlannedBackend>,
    /// Policy that produced the plan; `None` for the explicit list.
    pub policy: Option<DefaultPolicy>,
}

impl BackendPlan {
    /// Quorum used when the configuration sets none.
    #[must_use]
    pub fn default_quorum(&self, members: usize) -> u32 {
        self.policy.map_or(1, |policy| policy.default_quorum(members))
    }

    fn custom_entries(config: &ProviderConfig) -> impl Iterator<Item = PlannedBackend> + '_ {
        config
            .custom
            .iter()
            .cloned()
            .map(|endpoint| PlannedBackend::required(BackendSelection::Custom(endpoint)))
    }
}

/// Default backend bundle chosen by network family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultPolicy {
    /// BNB Smart Chain bundle: `BscScan`, Pocket and optionally Moralis.
    Binance,
    /// Every other network.
    Generic,
}

impl DefaultPolicy {
    /// Picks the policy for `network`.
    #[must_use]
    pub fn for_network(registry: &NetworkRegistry, network: &NetworkDescriptor) -> Self {
        if registry.is_family_member(network, NetworkFamily::Binance) {
            Self::Binance
        } else {
            Self::Generic
        }
    }

    /// `min(n, 2)` for the Binance bundle, `1` otherwise.
    #[must_use]
    pub fn default_quorum(self, members: usize) -> u32 {
        match self {
            Self::Binance => u32::try_from(members.min(2)).unwrap_or(2),
            Self::Generic => 1,
        }
    }

    /// Plans the default bundle for `network`.
    #[must_use]
    pub fn plan(self, network: &NetworkDescriptor, config: &ProviderConfig) -> BackendPlan {
        let mut entries = match self {
            Self::Binance => binance_bundle(config),
            Self::Generic => generic_bundle(network, config),
        };
        entries.extend(BackendPlan::custom_entries(config));
        tracing::debug!(
            policy = ?self,
            network = %network,
            backends = entries.len(),
            "default backend plan"
        );
        BackendPlan {
            entries,
            policy: Some(self),
        }
    }
}

fn binance_bundle(config: &ProviderConfig) -> Vec<PlannedBackend> {
    let ignored = [
        ("etherscan", config.etherscan.is_some()),
        ("infura", config.infura.is_some()),
        ("alchemy", config.alchemy.is_some()),
        ("ankr", config.ankr.is_some()),
        ("cloudflare", config.cloudflare.is_some()),
    ];
    for (backend, _) in ignored.iter().filter(|(_, present)| *present) {
        tracing::debug!(backend, "credential ignored by the binance default bundle");
    }

    let mut entries = vec![
        PlannedBackend::required(BackendSelection::Bscscan(config.bscscan.clone())),
        PlannedBackend::required(BackendSelection::Pocket(config.pocket.clone())),
    ];
    if let Some(moralis) = &config.moralis {
        entries.push(PlannedBackend::required(BackendSelection::Moralis(moralis.clone())));
    }
    entries
}

fn generic_bundle(network: &NetworkDescriptor, config: &ProviderConfig) -> Vec<PlannedBackend> {
    let mut entries = vec![PlannedBackend::optional(BackendSelection::Etherscan(
        config.etherscan.clone(),
    ))];
    if let Some(key) = &config.bscscan {
        entries.push(PlannedBackend::optional(BackendSelection::Bscscan(Some(key.clone()))));
    }
    entries.push(PlannedBackend::optional(BackendSelection::Pocket(config.pocket.clone())));
    if let Some(moralis) = &config.moralis {
        entries.push(PlannedBackend::optional(BackendSelection::Moralis(moralis.clone())));
    }
    entries.extend([
        PlannedBackend::optional(BackendSelection::Infura(config.infura.clone())),
        PlannedBackend::optional(BackendSelection::Alchemy(config.alchemy.clone())),
        PlannedBackend::optional(BackendSelection::Ankr(config.ankr.clone())),
    ]);
    if *network == HOMESTEAD && config.cloudflare != Some(false) {
        entries.push(PlannedBackend::optional(BackendSelection::Cloudflare));
    }
    entries
}

/// Plans strictly from the keys present in `config`.
///
/// # Errors
///
/// Returns [`Error::UnsupportedNetwork`] when `cloudflare = true` targets a network
/// other than homestead.
pub fn explicit_plan(
    network: &NetworkDescriptor,
    config: &ProviderConfig,
) -> Result<BackendPlan, Error> {
    let mut entries = Vec::new();
    let mut push = |selection| entries.push(PlannedBackend::required(selection));

    if let Some(key) = &config.etherscan {
        push(BackendSelection::Etherscan(Some(key.clone())));
    }
    if let Some(key) = &config.bscscan {
        push(BackendSelection::Bscscan(Some(key.clone())));
    }
    if let Some(pocket) = &config.pocket {
        push(BackendSelection::Pocket(Some(pocket.clone())));
    }
    if let Some(moralis) = &config.moralis {
        push(BackendSelection::Moralis(moralis.clone()));
    }
    if let Some(infura) = &config.infura {
        push(BackendSelection::Infura(Some(infura.clone())));
    }
    if let Some(key) = &config.alchemy {
        push(BackendSelection::Alchemy(Some(key.clone())));
    }
    if let Some(key) = &config.ankr {
        push(BackendSelection::Ankr(Some(key.clone())));
    }
    if config.cloudflare == Some(true) {
        if *network != HOMESTEAD {
            return Err(Error::unsupported("cloudflare", network));
        }
        push(BackendSelection::Cloudflare);
    }
    entries.extend(BackendPlan::custom_entries(config));

    Ok(BackendPlan {
        entries,
        policy: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::config::{CustomEndpoint, MoralisCredential};
    use crate::network::{BNB, BNBT, GOERLI, MATIC};

    fn kinds(plan: &BackendPlan) -> Vec<BackendKind> {
        plan.entries.iter().map(|e| e.selection.kind()).collect()
    }

    #[test]
    fn binance_family_gets_the_binance_policy() {
        let registry = NetworkRegistry::builtin();
        assert_eq!(DefaultPolicy::for_network(registry, &BNB), DefaultPolicy::Binance);
        assert_eq!(DefaultPolicy::for_network(registry, &BNBT), DefaultPolicy::Binance);
        assert_eq!(DefaultPolicy::for_network(registry, &HOMESTEAD), DefaultPolicy::Generic);
        // Same chain id, different name: not a member.
        let lookalike = NetworkDescriptor::new(97, "chapel");
        assert_eq!(DefaultPolicy::for_network(registry, &lookalike), DefaultPolicy::Generic);
    }

    #[test]
    fn binance_bundle_adds_moralis_only_when_keyed() {
        let mut config = ProviderConfig::for_network(97);
        config.etherscan = Some("ignored".to_owned());
        let plan = DefaultPolicy::Binance.plan(&BNBT, &config);
        assert_eq!(kinds(&plan), [BackendKind::Bscscan, BackendKind::Pocket]);
        assert!(plan.entries.iter().all(|e| !e.optional));
        assert_eq!(plan.default_quorum(2), 2);

        config.moralis = Some(MoralisCredential::ApiKey("key".to_owned()));
        config.custom = vec![CustomEndpoint::new("http://127.0.0.1:8545")];
        let plan = DefaultPolicy::Binance.plan(&BNBT, &config);
        assert_eq!(
            kinds(&plan),
            [BackendKind::Bscscan, BackendKind::Pocket, BackendKind::Moralis, BackendKind::Custom]
        );
        assert_eq!(plan.default_quorum(4), 2);
        assert_eq!(plan.default_quorum(1), 1);
    }

    #[test]
    fn caller_credential_replaces_default() {
        let mut config = ProviderConfig::for_network(97);
        config.bscscan = Some("mine".to_owned());
        let plan = DefaultPolicy::Binance.plan(&BNBT, &config);
        let bscscan: Vec<_> = plan
            .entries
            .iter()
            .filter(|e| e.selection.kind() == BackendKind::Bscscan)
            .collect();
        assert_eq!(bscscan.len(), 1);
        assert_eq!(bscscan[0].selection, BackendSelection::Bscscan(Some("mine".to_owned())));
    }

    #[test]
    fn generic_bundle_adds_cloudflare_on_homestead_only() {
        let config = ProviderConfig::default();
        let mainnet = DefaultPolicy::Generic.plan(&HOMESTEAD, &config);
        assert_eq!(
            kinds(&mainnet),
            [
                BackendKind::Etherscan,
                BackendKind::Pocket,
                BackendKind::Infura,
                BackendKind::Alchemy,
                BackendKind::Ankr,
                BackendKind::Cloudflare,
            ]
        );
        assert_eq!(mainnet.default_quorum(6), 1);
        let goerli = DefaultPolicy::Generic.plan(&GOERLI, &config);
        assert!(!kinds(&goerli).contains(&BackendKind::Cloudflare));

        let opted_out = ProviderConfig {
            cloudflare: Some(false),
            ..ProviderConfig::default()
        };
        let opted_out = DefaultPolicy::Generic.plan(&HOMESTEAD, &opted_out);
        assert!(!kinds(&opted_out).contains(&BackendKind::Cloudflare));
    }

    #[test]
    fn generic_custom_entries_stay_mandatory() {
        let config = ProviderConfig {
            custom: vec![CustomEndpoint::new("http://127.0.0.1:8545")],
            ..ProviderConfig::default()
        };
        let plan = DefaultPolicy::Generic.plan(&MATIC, &config);
        let custom = plan.entries.last().unwrap();
        assert_eq!(custom.selection.kind(), BackendKind::Custom);
        assert!(!custom.optional);
    }

    #[test]
    fn explicit_plan_follows_fixed_order() {
        let config = ProviderConfig {
            use_default_provider: false,
            custom: vec![CustomEndpoint::new("http://127.0.0.1:8545")],
            cloudflare: Some(true),
            alchemy: Some("a".to_owned()),
            etherscan: Some("e".to_owned()),
            ..ProviderConfig::default()
        };
        let plan = explicit_plan(&HOMESTEAD, &config).unwrap();
        assert_eq!(
            kinds(&plan),
            [
                BackendKind::Etherscan,
                BackendKind::Alchemy,
                BackendKind::Cloudflare,
                BackendKind::Custom,
            ]
        );
        assert_eq!(plan.default_quorum(4), 1);
    }

    #[test]
    fn explicit_cloudflare_off_mainnet_fails_fast() {
        let config = ProviderConfig {
            use_default_provider: false,
            cloudflare: Some(true),
            ..ProviderConfig::default()
        };
        assert!(explicit_plan(&BNB, &config).unwrap_err().is_unsupported_network());
        let lookalike = NetworkDescriptor::new(1, "foo");
        assert!(explicit_plan(&lookalike, &config).unwrap_err().is_unsupported_network());
        let disabled = ProviderConfig {
            cloudflare: Some(false),
            ..config
        };
        assert!(explicit_plan(&BNB, &disabled).unwrap().entries.is_empty());
    }
}

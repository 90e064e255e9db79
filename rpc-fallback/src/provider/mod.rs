//! Resolved providers and quorum-based fallback composition.
//!
//! - [`factory`] — [`ProviderFactory`]: plans backends, waits for readiness, composes.
//! - [`policy`] — [`DefaultPolicy`]: Binance default bundle versus the generic default.

mod factory;
mod policy;

use std::future::Future;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;

pub use self::factory::*;
pub use self::policy::*;

use crate::backend::{BackendInstance, BackendKind, RpcCall, Transport};
use crate::error::Error;
use crate::network::NetworkDescriptor;

/// One member of a [`FallbackSet`].
#[derive(Debug, Clone)]
pub struct FallbackMember {
    instance: BackendInstance,
    priority: u32,
    weight: u32,
}

impl FallbackMember {
    /// Member with priority 1 and weight 1.
    #[must_use]
    pub const fn new(instance: BackendInstance) -> Self {
        Self {
            instance,
            priority: 1,
            weight: 1,
        }
    }

    /// Lower priorities are asked first.
    #[must_use]
    pub const fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Weight this member's answer carries towards the quorum. Zero is raised to one.
    #[must_use]
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight.max(1);
        self
    }

    /// Backend instance.
    #[must_use]
    pub const fn instance(&self) -> &BackendInstance {
        &self.instance
    }

    /// Priority.
    #[must_use]
    pub const fn priority(&self) -> u32 {
        self.priority
    }

    /// Weight.
    #[must_use]
    pub const fn weight(&self) -> u32 {
        self.weight
    }
}

/// Two or more backends whose answers are reconciled by weighted quorum.
#[derive(Debug, Clone)]
pub struct FallbackSet {
    members: Vec<FallbackMember>,
    quorum: u32,
}

impl FallbackSet {
    /// Builds a set, ordering members by priority (stable).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuorum`] for fewer than two members, a zero quorum, or
    /// a quorum larger than the member count or their total weight.
    pub fn new(mut members: Vec<FallbackMember>, quorum: u32) -> Result<Self, Error> {
        let total_weight: u64 = members.iter().map(|m| u64::from(m.weight)).sum();
        let too_large = usize::try_from(quorum).map_or(true, |q| q > members.len())
            || u64::from(quorum) > total_weight;
        if members.len() < 2 || quorum == 0 || too_large {
            return Err(Error::InvalidQuorum {
                quorum,
                members: members.len(),
            });
        }
        members.sort_by_key(|m| m.priority);
        Ok(Self { members, quorum })
    }

    /// Members in priority order.
    #[must_use]
    pub fn members(&self) -> &[FallbackMember] {
        &self.members
    }

    /// Required agreeing weight.
    #[must_use]
    pub const fn quorum(&self) -> u32 {
        self.quorum
    }

    /// Sends one read request and returns the first result reaching the quorum.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QuorumNotReached`] once every member has answered without
    /// enough agreement.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, Error> {
        self.reach_quorum(method, |instance| instance.request(method, params.clone()))
            .await
    }

    /// Sends a batch and applies the quorum to the whole batch result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QuorumNotReached`] once every member has answered without
    /// enough agreement.
    pub async fn request_batch(&self, calls: &[RpcCall]) -> Result<Vec<Value>, Error> {
        self.reach_quorum("batch", |instance| instance.request_batch(calls))
            .await
    }

    /// Asks members in waves until one answer carries `quorum` weight.
    ///
    /// The first wave holds just enough members to reach the quorum if they all
    /// agree. Each later wave adds enough members to close the gap between the
    /// best tally so far and the quorum.
    async fn reach_quorum<'a, T, F, Fut>(&'a self, method: &str, call: F) -> Result<T, Error>
    where
        T: PartialEq,
        F: Fn(&'a BackendInstance) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut tallies: Vec<(T, u32)> = Vec::new();
        let mut failed = 0usize;
        let mut best = 0u32;
        let mut next = 0usize;

        while next < self.members.len() {
            let needed = self.quorum.saturating_sub(best).max(1);
            let mut wave = Vec::new();
            let mut wave_weight = 0u32;
            while next < self.members.len() && wave_weight < needed {
                let member = &self.members[next];
                wave_weight = wave_weight.saturating_add(member.weight);
                wave.push(member);
                next += 1;
            }

            let outcomes = join_all(wave.iter().map(|&member| call(&member.instance))).await;
            for (member, outcome) in wave.iter().zip(outcomes) {
                match outcome {
                    Ok(value) => {
                        if let Some(tally) = tallies.iter_mut().find(|(seen, _)| *seen == value) {
                            tally.1 = tally.1.saturating_add(member.weight);
                        } else {
                            tallies.push((value, member.weight));
                        }
                    }
                    Err(e) => {
                        failed += 1;
                        tracing::debug!(
                            backend = %member.instance.label(),
                            method,
                            error = %e,
                            "fallback member failed"
                        );
                    }
                }
            }

            if let Some(index) = (0..tallies.len()).max_by_key(|&i| tallies[i].1) {
                best = tallies[index].1;
                if best >= self.quorum {
                    return Ok(tallies.swap_remove(index).0);
                }
            }
        }

        tracing::warn!(method, best, quorum = self.quorum, failed, "quorum not reached");
        Err(Error::QuorumNotReached {
            method: method.to_owned(),
            best,
            quorum: self.quorum,
            failed,
        })
    }
}

/// The logical read client produced by a resolution.
#[derive(Debug, Clone)]
pub enum ResolvedProvider {
    /// Exactly one backend.
    Single(BackendInstance),
    /// Two or more backends under a quorum.
    Fallback(FallbackSet),
}

impl ResolvedProvider {
    /// Composes instantiated backends: none is an error, one is [`Self::Single`], two
    /// or more form a [`FallbackSet`] with `quorum`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoProviderConfigured`] for zero instances and
    /// [`Error::InvalidQuorum`] if `quorum` does not fit the member count.
    pub fn compose(
        network: &NetworkDescriptor,
        mut instances: Vec<BackendInstance>,
        quorum: u32,
    ) -> Result<Self, Error> {
        match instances.len() {
            0 => Err(Error::NoProviderConfigured {
                network: network.to_string(),
            }),
            1 => match instances.pop() {
                Some(instance) => Ok(Self::Single(instance)),
                None => Err(Error::NoProviderConfigured {
                    network: network.to_string(),
                }),
            },
            _ => {
                let members = instances.into_iter().map(FallbackMember::new).collect();
                Ok(Self::Fallback(FallbackSet::new(members, quorum)?))
            }
        }
    }

    /// Backends in priority order.
    pub fn backends(&self) -> impl Iterator<Item = &BackendInstance> {
        let members = match self {
            Self::Single(_) => &[][..],
            Self::Fallback(set) => set.members(),
        };
        let single = match self {
            Self::Single(instance) => Some(instance),
            Self::Fallback(_) => None,
        };
        single.into_iter().chain(members.iter().map(FallbackMember::instance))
    }

    /// Effective quorum; `1` for a single backend.
    #[must_use]
    pub const fn quorum(&self) -> u32 {
        match self {
            Self::Single(_) => 1,
            Self::Fallback(set) => set.quorum(),
        }
    }

    /// Sends one read request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Request`] from a single backend, or
    /// [`Error::QuorumNotReached`] from a fallback set.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, Error> {
        match self {
            Self::Single(instance) => instance.request(method, params).await,
            Self::Fallback(set) => set.request(method, params).await,
        }
    }

    /// Sends several read requests, one round trip per JSON-RPC backend.
    ///
    /// # Errors
    ///
    /// Same as [`Self::request`].
    pub async fn request_batch(&self, calls: &[RpcCall]) -> Result<Vec<Value>, Error> {
        match self {
            Self::Single(instance) => instance.request_batch(calls).await,
            Self::Fallback(set) => set.request_batch(calls).await,
        }
    }

    /// Serializable description, without credentials.
    #[must_use]
    pub fn summary(&self) -> ProviderSummary {
        ProviderSummary {
            mode: match self {
                Self::Single(_) => "single",
                Self::Fallback(_) => "fallback",
            },
            quorum: self.quorum(),
            backends: self
                .backends()
                .map(|instance| BackendSummary {
                    label: instance.label(),
                    kind: instance.kind(),
                    network: instance.network().clone(),
                    transport: instance.transport(),
                    community: instance.is_community_resource(),
                })
                .collect(),
        }
    }
}

/// Output of [`ResolvedProvider::summary`].
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSummary {
    /// `single` or `fallback`.
    pub mode: &'static str,
    /// Effective quorum.
    pub quorum: u32,
    /// Backends in priority order.
    pub backends: Vec<BackendSummary>,
}

/// One backend in a [`ProviderSummary`].
#[derive(Debug, Clone, Serialize)]
pub struct BackendSummary {
    /// `kind(network)` label.
    pub label: String,
    /// Backend kind tag.
    pub kind: BackendKind,
    /// Network served.
    pub network: NetworkDescriptor,
    /// Request transport.
    pub transport: Transport,
    /// Whether the shared community credential is in use.
    pub community: bool,
}

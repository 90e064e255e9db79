//! Unified error types for provider resolution and reads.

use thiserror::Error;

/// Top-level error type for resolution and the read path.
///
/// Every variant names the backend and/or network it concerns so that a
/// misconfiguration can be traced from the message alone.
#[derive(Debug, Error)]
pub enum Error {
    /// The network identifier is missing or malformed.
    #[error("invalid network: {0}")]
    InvalidNetwork(String),

    /// The identifier is well-formed but the backend cannot serve it.
    #[error("{backend} does not support network {network}")]
    UnsupportedNetwork {
        /// Backend label, e.g. `pocket` or `custom(http://...)`.
        backend: String,
        /// Network display name.
        network: String,
    },

    /// A required credential is missing or malformed.
    #[error("invalid credential for {backend}: {reason}")]
    InvalidCredential {
        /// Backend label.
        backend: String,
        /// What is wrong with the credential.
        reason: String,
    },

    /// Defaults were disabled and nothing usable was configured.
    #[error("no provider configured for network {network}")]
    NoProviderConfigured {
        /// Network display name.
        network: String,
    },

    /// A readiness probe failed, timed out, or was cancelled.
    #[error("backend unreachable: {backend}: {reason}")]
    BackendUnreachable {
        /// Label of every failing backend, comma separated.
        backend: String,
        /// Failure reason(s).
        reason: String,
    },

    /// Quorum is zero or larger than the number of members.
    #[error("invalid quorum {quorum} for {members} backends")]
    InvalidQuorum {
        /// Requested quorum.
        quorum: u32,
        /// Number of composed members.
        members: usize,
    },

    /// A read request failed on one backend.
    #[error("{backend} request failed: {reason}")]
    Request {
        /// Backend label.
        backend: String,
        /// Failure reason.
        reason: String,
    },

    /// Not enough fallback members agreed on a result.
    #[error(
        "quorum not reached for {method}: best agreement {best}/{quorum}, {failed} backends failed"
    )]
    QuorumNotReached {
        /// RPC method, or `batch` for multicall batches.
        method: String,
        /// Weight of the largest agreeing group.
        best: u32,
        /// Required weight.
        quorum: u32,
        /// Number of members that returned an error.
        failed: usize,
    },

    /// Configuration file could not be resolved, read, or parsed.
    #[error("config: {0}")]
    Config(String),
}

impl Error {
    /// Configuration error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Configuration error with an underlying cause appended.
    pub fn config_with(message: impl Into<String>, source: impl std::fmt::Display) -> Self {
        Self::Config(format!("{}: {source}", message.into()))
    }

    pub(crate) fn unsupported(backend: impl Into<String>, network: impl std::fmt::Display) -> Self {
        Self::UnsupportedNetwork {
            backend: backend.into(),
            network: network.to_string(),
        }
    }

    pub(crate) fn credential(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCredential {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unreachable(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BackendUnreachable {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn request(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Request {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for [`Error::UnsupportedNetwork`].
    #[must_use]
    pub const fn is_unsupported_network(&self) -> bool {
        matches!(self, Self::UnsupportedNetwork { .. })
    }
}

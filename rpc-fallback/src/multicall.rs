//! Batching decorator over a [`ResolvedProvider`].

use serde_json::Value;

use crate::backend::RpcCall;
use crate::error::Error;
use crate::provider::ResolvedProvider;

/// Wraps a resolved provider and sends collected calls as one batch.
///
/// Performs no resolution of its own; every failure is the wrapped provider's.
#[derive(Debug, Clone)]
pub struct MulticallProvider {
    inner: ResolvedProvider,
}

impl MulticallProvider {
    /// Wraps `inner`.
    #[must_use]
    pub const fn wrap(inner: ResolvedProvider) -> Self {
        Self { inner }
    }

    /// Wrapped provider.
    #[must_use]
    pub const fn inner(&self) -> &ResolvedProvider {
        &self.inner
    }

    /// Unwraps the provider.
    #[must_use]
    pub fn into_inner(self) -> ResolvedProvider {
        self.inner
    }

    /// Sends one read request, unbatched.
    ///
    /// # Errors
    ///
    /// Errors of the wrapped provider.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, Error> {
        self.inner.request(method, params).await
    }

    /// Sends `calls` in one round trip per JSON-RPC backend. Results are in call order.
    ///
    /// # Errors
    ///
    /// Errors of the wrapped provider. One failing call fails the whole batch.
    pub async fn batch(&self, calls: &[RpcCall]) -> Result<Vec<Value>, Error> {
        tracing::debug!(calls = calls.len(), "sending multicall batch");
        self.inner.request_batch(calls).await
    }

    /// Sends every call collected in `batch`.
    ///
    /// # Errors
    ///
    /// See [`Self::batch`].
    pub async fn execute(&self, batch: &MulticallBatch) -> Result<Vec<Value>, Error> {
        self.batch(batch.calls()).await
    }
}

impl From<ResolvedProvider> for MulticallProvider {
    fn from(inner: ResolvedProvider) -> Self {
        Self::wrap(inner)
    }
}

/// Collects calls for [`MulticallProvider::execute`].
#[derive(Debug, Clone, Default)]
pub struct MulticallBatch {
    calls: Vec<RpcCall>,
}

impl MulticallBatch {
    /// Empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self { calls: Vec::new() }
    }

    /// Adds a call and returns its index in the result vector.
    pub fn add(&mut self, method: impl Into<String>, params: Value) -> usize {
        self.calls.push(RpcCall::new(method, params));
        self.calls.len() - 1
    }

    /// Collected calls in insertion order.
    #[must_use]
    pub fn calls(&self) -> &[RpcCall] {
        &self.calls
    }

    /// Number of collected calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Whether no call has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn batch_indices_follow_insertion_order() {
        let mut batch = MulticallBatch::new();
        assert!(batch.is_empty());
        assert_eq!(batch.add("eth_blockNumber", Value::Null), 0);
        assert_eq!(batch.add("eth_getBalance", json!(["0xabc", "latest"])), 1);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.calls()[1].method, "eth_getBalance");
    }
}

//! Prefix-keyed registry of KMS backends.
//!
//! Backends register a constructor under a key-reference prefix such as
//! `"awskms://"`. [`Registry::get`] picks the backend whose prefix matches the
//! caller's key reference and runs its constructor.
//!
//! When several registered prefixes match, the longest one wins, so
//! `"kms://a/key1"` goes to `"kms://a"` even if `"kms://"` is registered too.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{KmsError, Result};
use crate::options::RpcOptions;
use crate::signing::{HashAlgorithm, SignerVerifier};

pub type InitFuture = BoxFuture<'static, Result<Box<dyn SignerVerifier>>>;

/// Constructor for a backend's [`SignerVerifier`].
///
/// Receives the full key reference, not just the part after the prefix.
/// Any closure with the same shape as [`ProviderInit::init`] implements this;
/// [`Registry::add_provider`] takes plain async closures and boxes them.
pub trait ProviderInit: Send + Sync {
    fn init(
        &self,
        ctx: CancellationToken,
        key_resource_id: String,
        hash: HashAlgorithm,
        opts: RpcOptions,
    ) -> InitFuture;
}

impl<F> ProviderInit for F
where
    F: Fn(CancellationToken, String, HashAlgorithm, RpcOptions) -> InitFuture + Send + Sync,
{
    fn init(
        &self,
        ctx: CancellationToken,
        key_resource_id: String,
        hash: HashAlgorithm,
        opts: RpcOptions,
    ) -> InitFuture {
        self(ctx, key_resource_id, hash, opts)
    }
}

/// Table of KMS backends keyed by key-reference prefix.
///
/// Safe to share between tasks (`Arc<Registry>`); registration and lookup
/// may run concurrently.
#[derive(Default)]
pub struct Registry {
    providers: RwLock<BTreeMap<String, Arc<dyn ProviderInit>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `init` under `prefix`, replacing any earlier registration.
    pub fn add_provider<F, Fut>(&self, prefix: impl Into<String>, init: F)
    where
        F: Fn(CancellationToken, String, HashAlgorithm, RpcOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Box<dyn SignerVerifier>>> + Send + 'static,
    {
        self.add_provider_init(
            prefix,
            Arc::new(
                move |ctx: CancellationToken,
                      key_resource_id: String,
                      hash: HashAlgorithm,
                      opts: RpcOptions|
                      -> InitFuture { init(ctx, key_resource_id, hash, opts).boxed() },
            ),
        );
    }

    /// Register an already boxed constructor under `prefix`.
    pub fn add_provider_init(&self, prefix: impl Into<String>, init: Arc<dyn ProviderInit>) {
        let prefix = prefix.into();
        let replaced = self
            .providers
            .write()
            .insert(prefix.clone(), init)
            .is_some();
        debug!(%prefix, replaced, "registered kms provider");
    }

    /// Registered prefixes, sorted.
    pub fn supported_providers(&self) -> Vec<String> {
        self.providers.read().keys().cloned().collect()
    }

    pub fn supports(&self, prefix: &str) -> bool {
        self.providers.read().contains_key(prefix)
    }

    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }

    /// The prefix [`get`](Self::get) would pick for `key_resource_id`.
    pub fn resolve_prefix(&self, key_resource_id: &str) -> Option<String> {
        self.lookup(key_resource_id).map(|(prefix, _)| prefix)
    }

    /// Build a [`SignerVerifier`] for `key_resource_id`.
    ///
    /// Runs the constructor of the longest registered prefix of
    /// `key_resource_id` and returns whatever it returns. Fails with
    /// [`KmsError::NoProviderFound`] if no prefix matches.
    pub async fn get(
        &self,
        ctx: &CancellationToken,
        key_resource_id: &str,
        hash: HashAlgorithm,
        opts: RpcOptions,
    ) -> Result<Box<dyn SignerVerifier>> {
        let Some((prefix, init)) = self.lookup(key_resource_id) else {
            debug!(key_resource_id, "no kms provider matched");
            return Err(KmsError::NoProviderFound {
                key_resource_id: key_resource_id.to_string(),
            });
        };

        debug!(%prefix, key_resource_id, %hash, "resolving kms signer");
        init.init(ctx.clone(), key_resource_id.to_string(), hash, opts)
            .await
    }

    fn lookup(&self, key_resource_id: &str) -> Option<(String, Arc<dyn ProviderInit>)> {
        let providers = self.providers.read();
        providers
            .iter()
            .filter(|(prefix, _)| key_resource_id.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(prefix, init)| (prefix.clone(), Arc::clone(init)))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("providers", &self.supported_providers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing(message: &'static str) -> Arc<dyn ProviderInit> {
        Arc::new(
            move |_: CancellationToken, _: String, _: HashAlgorithm, _: RpcOptions| -> InitFuture {
                async move { Err(KmsError::Backend(anyhow::anyhow!(message))) }.boxed()
            },
        )
    }

    #[test]
    fn new_registry_is_empty() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.supported_providers().is_empty());
    }

    #[test]
    fn supported_providers_sorted_without_duplicates() {
        let registry = Registry::new();
        registry.add_provider_init("hashivault://", failing("vault"));
        registry.add_provider_init("awskms://", failing("aws"));
        registry.add_provider_init("gcpkms://", failing("gcp"));
        registry.add_provider_init("awskms://", failing("aws again"));

        assert_eq!(
            registry.supported_providers(),
            vec!["awskms://", "gcpkms://", "hashivault://"]
        );
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn empty_prefix_is_accepted() {
        let registry = Registry::new();
        registry.add_provider_init("", failing("catch-all"));
        assert!(registry.supports(""));
        assert_eq!(registry.resolve_prefix("anything://key").as_deref(), Some(""));
    }

    #[test]
    fn longest_prefix_wins() {
        let registry = Registry::new();
        registry.add_provider_init("kms://", failing("generic"));
        registry.add_provider_init("kms://a", failing("specific"));
        registry.add_provider_init("", failing("catch-all"));

        assert_eq!(registry.resolve_prefix("kms://a/key1").as_deref(), Some("kms://a"));
        assert_eq!(registry.resolve_prefix("kms://b/key1").as_deref(), Some("kms://"));
        assert_eq!(registry.resolve_prefix("other://key").as_deref(), Some(""));
    }

    #[test]
    fn prefix_match_is_case_sensitive() {
        let registry = Registry::new();
        registry.add_provider_init("kms://", failing("kms"));
        assert!(registry.resolve_prefix("KMS://key").is_none());
        assert!(registry.resolve_prefix("kms:/").is_none());
    }

    #[tokio::test]
    async fn constructor_error_passes_through() {
        let registry = Registry::new();
        registry.add_provider_init("broken://", failing("backend unreachable"));

        let err = registry
            .get(
                &CancellationToken::new(),
                "broken://key",
                HashAlgorithm::Sha256,
                RpcOptions::default(),
            )
            .await
            .err()
            .unwrap();
        assert!(matches!(&err, KmsError::Backend(_)));
        assert_eq!(err.to_string(), "backend unreachable");
    }

    #[test]
    fn debug_lists_prefixes() {
        let registry = Registry::new();
        registry.add_provider_init("awskms://", failing("aws"));
        let debug = format!("{registry:?}");
        assert!(debug.contains("Registry"));
        assert!(debug.contains("awskms://"));
    }

    #[test]
    fn registry_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Registry>();
    }
}

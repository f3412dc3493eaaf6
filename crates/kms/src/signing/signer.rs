use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::crypto_signer::CryptoSigner;
use super::hash::HashAlgorithm;
use super::public_key::PublicKey;
use crate::error::Result;

/// Signs and verifies through a key-management service.
///
/// This is what [`Registry::get`](crate::Registry::get) hands back. Every
/// operation that may reach the backend takes the caller's cancellation
/// token; the backend decides how to honor it.
#[async_trait]
pub trait SignerVerifier: Send + Sync {
    /// Hash used by [`sign_message`](Self::sign_message) and
    /// [`verify_signature`](Self::verify_signature).
    fn hash_algorithm(&self) -> HashAlgorithm;

    async fn public_key(&self, ctx: &CancellationToken) -> Result<PublicKey>;

    /// Sign a digest already computed with [`hash_algorithm`](Self::hash_algorithm).
    async fn sign_digest(&self, ctx: &CancellationToken, digest: &[u8]) -> Result<Vec<u8>>;

    async fn sign_message(&self, ctx: &CancellationToken, message: &[u8]) -> Result<Vec<u8>> {
        let digest = self.hash_algorithm().digest(message)?;
        self.sign_digest(ctx, &digest).await
    }

    /// Verify `signature` over `message` against the current public key.
    async fn verify_signature(
        &self,
        ctx: &CancellationToken,
        signature: &[u8],
        message: &[u8],
    ) -> Result<()> {
        let hash = self.hash_algorithm();
        let digest = hash.digest(message)?;
        let public_key = self.public_key(ctx).await?;
        public_key.verify_digest(hash, &digest, signature)
    }

    /// Provision a new key pair for `algorithm` at the backend.
    async fn create_key(&self, ctx: &CancellationToken, algorithm: &str) -> Result<PublicKey>;

    /// Handle for synchronous consumers, see [`CryptoSigner`].
    async fn crypto_signer(&self, ctx: &CancellationToken) -> Result<CryptoSigner>;

    fn supported_algorithms(&self) -> Vec<String>;

    /// Algorithm used when none is given. Always in `supported_algorithms()`.
    fn default_algorithm(&self) -> String;
}

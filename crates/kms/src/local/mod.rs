//! In-process KMS backend for development and tests.
//!
//! Key references look like `localkms://<key-name>`. Key material is derived
//! from the key name (and key version, if given), so the same reference always
//! yields the same key and nothing is persisted.

mod rsa;
mod secp256k1;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use self::rsa::RsaKey;
use self::secp256k1::Secp256k1Key;
use crate::error::{KmsError, Result};
use crate::options::RpcOptions;
use crate::registry::Registry;
use crate::signing::{
    CryptoSigner, DigestSigner, ErrorSink, HashAlgorithm, Padding, PublicKey, SignerOpts,
    SignerVerifier, deferred_errors,
};

pub const REFERENCE_SCHEME: &str = "localkms://";

pub const ALGORITHM_SECP256K1: &str = "secp256k1";
pub const ALGORITHM_RSA_PKCS1V15_SHA256: &str = "rsa-pkcs1v15-sha256";

const SUPPORTED_ALGORITHMS: [&str; 2] = [ALGORITHM_SECP256K1, ALGORITHM_RSA_PKCS1V15_SHA256];

/// Register the local backend under [`REFERENCE_SCHEME`].
pub fn register(registry: &Registry) {
    registry.add_provider(REFERENCE_SCHEME, init);
}

async fn init(
    ctx: CancellationToken,
    key_resource_id: String,
    hash: HashAlgorithm,
    opts: RpcOptions,
) -> Result<Box<dyn SignerVerifier>> {
    let signer = LocalSignerVerifier::new(&ctx, &key_resource_id, hash, opts).await?;
    Ok(Box::new(signer))
}

enum LocalKey {
    Secp256k1(Secp256k1Key),
    Rsa(RsaKey),
}

impl LocalKey {
    /// Both key types start from SHA-256 of the seed string.
    fn derive(algorithm: &str, seed: &str) -> Result<Self> {
        let material: [u8; 32] = Sha256::digest(seed.as_bytes()).into();
        match algorithm {
            ALGORITHM_SECP256K1 => Ok(Self::Secp256k1(Secp256k1Key::from_scalar(&material)?)),
            ALGORITHM_RSA_PKCS1V15_SHA256 => Ok(Self::Rsa(RsaKey::from_seed(material)?)),
            other => Err(unsupported_algorithm(other)),
        }
    }

    fn padding(&self) -> Option<Padding> {
        match self {
            Self::Secp256k1(_) => None,
            Self::Rsa(_) => Some(Padding::Pkcs1v15),
        }
    }

    fn public_key(&self) -> PublicKey {
        match self {
            Self::Secp256k1(key) => key.public_key(),
            Self::Rsa(key) => key.public_key(),
        }
    }

    fn sign_digest(&self, hash: HashAlgorithm, digest: &[u8]) -> Result<Vec<u8>> {
        hash.check_digest(digest)?;
        match self {
            Self::Secp256k1(key) => key.sign_digest(digest),
            Self::Rsa(key) => key.sign_digest(hash, digest),
        }
    }
}

fn unsupported_algorithm(algorithm: &str) -> KmsError {
    KmsError::UnsupportedAlgorithm {
        algorithm: algorithm.to_string(),
        supported: SUPPORTED_ALGORITHMS.iter().map(ToString::to_string).collect(),
    }
}

fn ensure_active(ctx: &CancellationToken) -> Result<()> {
    if ctx.is_cancelled() {
        return Err(KmsError::Cancelled);
    }
    Ok(())
}

/// Key derivation can be slow (RSA prime search), keep it off the runtime.
async fn derive_key(algorithm: String, seed: String) -> Result<LocalKey> {
    tokio::task::spawn_blocking(move || LocalKey::derive(&algorithm, &seed))
        .await
        .map_err(|e| anyhow::anyhow!("key derivation task failed: {e}"))?
}

/// [`SignerVerifier`] backed by a key derived in memory.
pub struct LocalSignerVerifier {
    key_name: String,
    seed: String,
    hash: HashAlgorithm,
    remote_verification: bool,
    key: RwLock<Arc<LocalKey>>,
}

impl LocalSignerVerifier {
    /// Parse `key_resource_id` and derive the default key for it.
    ///
    /// An unspecified `hash` falls back to SHA-256.
    pub async fn new(
        ctx: &CancellationToken,
        key_resource_id: &str,
        hash: HashAlgorithm,
        opts: RpcOptions,
    ) -> Result<Self> {
        ensure_active(ctx)?;

        let key_name = key_resource_id
            .strip_prefix(REFERENCE_SCHEME)
            .ok_or_else(|| {
                KmsError::invalid_key_reference(
                    key_resource_id,
                    format!("expected {REFERENCE_SCHEME}<key-name>"),
                )
            })?;
        if key_name.is_empty() {
            return Err(KmsError::invalid_key_reference(key_resource_id, "empty key name"));
        }

        let seed = match &opts.key_version {
            Some(version) => format!("{key_name}#{version}"),
            None => key_name.to_string(),
        };
        let key = derive_key(ALGORITHM_SECP256K1.to_string(), seed.clone()).await?;
        let hash = hash.or(HashAlgorithm::Sha256);

        debug!(key_name, %hash, key_version = ?opts.key_version, "opened local kms key");
        Ok(Self {
            key_name: key_name.to_string(),
            seed,
            hash,
            remote_verification: opts.remote_verification,
            key: RwLock::new(Arc::new(key)),
        })
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    fn current_key(&self) -> Arc<LocalKey> {
        Arc::clone(&*self.key.read())
    }
}

#[async_trait]
impl SignerVerifier for LocalSignerVerifier {
    fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash
    }

    async fn public_key(&self, ctx: &CancellationToken) -> Result<PublicKey> {
        ensure_active(ctx)?;
        Ok(self.current_key().public_key())
    }

    async fn sign_digest(&self, ctx: &CancellationToken, digest: &[u8]) -> Result<Vec<u8>> {
        ensure_active(ctx)?;
        self.current_key().sign_digest(self.hash, digest)
    }

    async fn verify_signature(
        &self,
        ctx: &CancellationToken,
        signature: &[u8],
        message: &[u8],
    ) -> Result<()> {
        ensure_active(ctx)?;
        if self.remote_verification {
            // nothing remote here, the key never leaves the process
            debug!(key_name = %self.key_name, "remote verification requested, verifying locally");
        }
        let digest = self.hash.digest(message)?;
        self.current_key()
            .public_key()
            .verify_digest(self.hash, &digest, signature)
    }

    async fn create_key(&self, ctx: &CancellationToken, algorithm: &str) -> Result<PublicKey> {
        ensure_active(ctx)?;
        if !SUPPORTED_ALGORITHMS.contains(&algorithm) {
            return Err(unsupported_algorithm(algorithm));
        }

        let key = derive_key(algorithm.to_string(), self.seed.clone()).await?;
        let public_key = key.public_key();
        *self.key.write() = Arc::new(key);

        info!(key_name = %self.key_name, algorithm, "created local kms key");
        Ok(public_key)
    }

    async fn crypto_signer(&self, ctx: &CancellationToken) -> Result<CryptoSigner> {
        ensure_active(ctx)?;
        let key = self.current_key();
        let opts = SignerOpts {
            hash: self.hash,
            padding: key.padding(),
        };
        let (sink, errors) = deferred_errors();
        Ok(CryptoSigner {
            signer: Arc::new(LocalDigestSigner { key, sink }),
            opts,
            errors,
        })
    }

    fn supported_algorithms(&self) -> Vec<String> {
        SUPPORTED_ALGORITHMS.iter().map(ToString::to_string).collect()
    }

    fn default_algorithm(&self) -> String {
        ALGORITHM_SECP256K1.to_string()
    }
}

/// Handle returned by [`LocalSignerVerifier::crypto_signer`].
///
/// Keeps signing with the key current at the time it was created.
struct LocalDigestSigner {
    key: Arc<LocalKey>,
    sink: ErrorSink,
}

impl DigestSigner for LocalDigestSigner {
    fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    fn sign(&self, digest: &[u8], opts: &SignerOpts) -> Result<Vec<u8>> {
        self.key.sign_digest(opts.hash, digest).inspect_err(|error| {
            self.sink.report(KmsError::Signing(error.to_string()));
        })
    }
}

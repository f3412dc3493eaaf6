use anyhow::Context;
use rand_chacha::ChaCha20Rng;
use rand_chacha::rand_core::SeedableRng;
use rsa::RsaPrivateKey;

use crate::error::{KmsError, Result};
use crate::signing::{HashAlgorithm, PublicKey, pkcs1v15_padding};

pub(crate) const RSA_KEY_BITS: usize = 2048;

/// RSA key signing PKCS#1 v1.5 over a precomputed digest.
///
/// The derived seed drives a ChaCha20 stream for prime generation, so a
/// given seed always yields the same modulus.
pub(crate) struct RsaKey {
    private_key: RsaPrivateKey,
}

impl RsaKey {
    pub(crate) fn from_seed(seed: [u8; 32]) -> Result<Self> {
        let mut rng = ChaCha20Rng::from_seed(seed);
        let private_key = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
            .context("generating RSA key from seed")?;
        Ok(Self { private_key })
    }

    pub(crate) fn sign_digest(&self, hash: HashAlgorithm, digest: &[u8]) -> Result<Vec<u8>> {
        self.private_key
            .sign(pkcs1v15_padding(hash)?, digest)
            .map_err(|e| KmsError::Signing(format!("rsa pkcs1v15 sign failed: {e}")))
    }

    pub(crate) fn public_key(&self) -> PublicKey {
        PublicKey::Rsa(self.private_key.to_public_key())
    }
}

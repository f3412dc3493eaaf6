use k256::ecdsa::{Signature, SigningKey, signature::hazmat::PrehashSigner};

use crate::error::{KmsError, Result};
use crate::signing::PublicKey;

/// Local secp256k1 key; the derived seed is used as the scalar.
pub(crate) struct Secp256k1Key(SigningKey);

impl Secp256k1Key {
    pub(crate) fn from_scalar(scalar: &[u8; 32]) -> Result<Self> {
        SigningKey::from_slice(scalar)
            .map(Self)
            .map_err(|e| anyhow::anyhow!("derived scalar is not a valid secp256k1 key: {e}").into())
    }

    /// Raw `r || s` ECDSA signature over a prehashed message.
    pub(crate) fn sign_digest(&self, digest: &[u8]) -> Result<Vec<u8>> {
        let signature: Signature = self
            .0
            .sign_prehash(digest)
            .map_err(|e| KmsError::Signing(format!("secp256k1 sign_prehash failed: {e}")))?;
        Ok(signature.to_bytes().to_vec())
    }

    pub(crate) fn public_key(&self) -> PublicKey {
        PublicKey::Secp256k1(*self.0.verifying_key())
    }
}

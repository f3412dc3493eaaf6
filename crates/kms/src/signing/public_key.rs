use anyhow::Context;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use rsa::pkcs8::EncodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha2::{Sha256, Sha384, Sha512};

use super::hash::HashAlgorithm;
use crate::error::{KmsError, Result};

/// Public half of a KMS-held key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Secp256k1(k256::ecdsa::VerifyingKey),
    Rsa(RsaPublicKey),
}

impl PublicKey {
    /// Short key-type name (e.g. "secp256k1").
    pub fn key_type(&self) -> &'static str {
        match self {
            Self::Secp256k1(_) => "secp256k1",
            Self::Rsa(_) => "rsa",
        }
    }

    /// SubjectPublicKeyInfo DER encoding.
    pub fn to_public_key_der(&self) -> Result<Vec<u8>> {
        let document = match self {
            Self::Secp256k1(key) => k256::PublicKey::from(*key)
                .to_public_key_der()
                .context("encoding secp256k1 public key to DER")?,
            Self::Rsa(key) => key
                .to_public_key_der()
                .context("encoding RSA public key to DER")?,
        };
        Ok(document.into_vec())
    }

    /// Verifies `signature` over a digest produced with `hash`.
    ///
    /// ECDSA signatures are checked against the prehash directly, RSA
    /// signatures as PKCS#1 v1.5 with the digest info for `hash`.
    pub fn verify_digest(&self, hash: HashAlgorithm, digest: &[u8], signature: &[u8]) -> Result<()> {
        match self {
            Self::Secp256k1(key) => {
                let signature = k256::ecdsa::Signature::from_slice(signature)
                    .map_err(|_| KmsError::InvalidSignature)?;
                key.verify_prehash(digest, &signature)
                    .map_err(|_| KmsError::InvalidSignature)
            }
            Self::Rsa(key) => key
                .verify(pkcs1v15_padding(hash)?, digest, signature)
                .map_err(|_| KmsError::InvalidSignature),
        }
    }
}

pub(crate) fn pkcs1v15_padding(hash: HashAlgorithm) -> Result<Pkcs1v15Sign> {
    match hash {
        HashAlgorithm::Sha256 => Ok(Pkcs1v15Sign::new::<Sha256>()),
        HashAlgorithm::Sha384 => Ok(Pkcs1v15Sign::new::<Sha384>()),
        HashAlgorithm::Sha512 => Ok(Pkcs1v15Sign::new::<Sha512>()),
        HashAlgorithm::Unspecified => Err(KmsError::UnsupportedHashAlgorithm(hash)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;
    use k256::ecdsa::signature::hazmat::PrehashSigner;
    use sha2::Digest;

    fn secp256k1_pair() -> (SigningKey, PublicKey) {
        let seed = Sha256::digest(b"public-key-test");
        let signing_key = SigningKey::from_bytes((&seed).into()).unwrap();
        let public = PublicKey::Secp256k1(*signing_key.verifying_key());
        (signing_key, public)
    }

    #[test]
    fn secp256k1_signature_verifies() {
        let (signing_key, public) = secp256k1_pair();
        let digest = Sha256::digest(b"message");
        let signature: k256::ecdsa::Signature = signing_key.sign_prehash(&digest).unwrap();

        public
            .verify_digest(HashAlgorithm::Sha256, &digest, &signature.to_bytes())
            .unwrap();
    }

    #[test]
    fn tampered_digest_is_rejected() {
        let (signing_key, public) = secp256k1_pair();
        let digest = Sha256::digest(b"message");
        let signature: k256::ecdsa::Signature = signing_key.sign_prehash(&digest).unwrap();

        let other = Sha256::digest(b"other message");
        let err = public
            .verify_digest(HashAlgorithm::Sha256, &other, &signature.to_bytes())
            .unwrap_err();
        assert!(matches!(err, KmsError::InvalidSignature));
    }

    #[test]
    fn malformed_signature_is_rejected() {
        let (_, public) = secp256k1_pair();
        let digest = Sha256::digest(b"message");
        let err = public
            .verify_digest(HashAlgorithm::Sha256, &digest, &[1, 2, 3])
            .unwrap_err();
        assert!(matches!(err, KmsError::InvalidSignature));
    }

    #[test]
    fn secp256k1_der_encoding() {
        let (_, public) = secp256k1_pair();
        let der = public.to_public_key_der().unwrap();
        assert_eq!(der[0], 0x30, "SPKI should be a DER SEQUENCE");
        assert!(der.len() > 33);
        assert_eq!(public.key_type(), "secp256k1");
    }

    #[test]
    fn rsa_padding_requires_a_hash() {
        assert!(pkcs1v15_padding(HashAlgorithm::Sha256).is_ok());
        assert!(matches!(
            pkcs1v15_padding(HashAlgorithm::Unspecified),
            Err(KmsError::UnsupportedHashAlgorithm(_))
        ));
    }
}

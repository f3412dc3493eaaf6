mod signer;
mod hash;
mod public_key;
mod crypto_signer;

pub use signer::SignerVerifier;
pub use hash::HashAlgorithm;
pub use public_key::PublicKey;
pub(crate) use public_key::pkcs1v15_padding;
pub use crypto_signer::{
    CryptoSigner, DeferredErrors, DigestSigner, ErrorSink, Padding, SignerOpts, deferred_errors,
};

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::hash::HashAlgorithm;
use super::public_key::PublicKey;
use crate::error::{KmsError, Result};

/// Signature padding scheme for RSA keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    Pkcs1v15,
}

/// Describes how a [`DigestSigner`] signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignerOpts {
    pub hash: HashAlgorithm,
    /// `None` for schemes without padding (ECDSA).
    pub padding: Option<Padding>,
}

/// Synchronous signing handle for generic consumers.
///
/// Implementations are sync, signing over an already computed digest.
pub trait DigestSigner: Send + Sync {
    fn public_key(&self) -> PublicKey;

    /// Sign a digest produced with `opts.hash`. Returns raw signature bytes.
    fn sign(&self, digest: &[u8], opts: &SignerOpts) -> Result<Vec<u8>>;
}

/// Result of [`SignerVerifier::crypto_signer`](super::SignerVerifier::crypto_signer).
///
/// `errors` receives failures the handle hits after it was handed out. Keep
/// it alive for as long as `signer` is in use.
pub struct CryptoSigner {
    pub signer: Arc<dyn DigestSigner>,
    pub opts: SignerOpts,
    pub errors: DeferredErrors,
}

impl fmt::Debug for CryptoSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoSigner")
            .field("key_type", &self.signer.public_key().key_type())
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

/// Creates the sending and receiving halves of a deferred-error channel.
pub fn deferred_errors() -> (ErrorSink, DeferredErrors) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ErrorSink { tx }, DeferredErrors { rx })
}

/// Backend side of the deferred-error channel.
#[derive(Debug, Clone)]
pub struct ErrorSink {
    tx: mpsc::UnboundedSender<KmsError>,
}

impl ErrorSink {
    pub fn report(&self, error: KmsError) {
        if let Err(mpsc::error::SendError(error)) = self.tx.send(error) {
            tracing::debug!(%error, "deferred error dropped, receiver is gone");
        }
    }
}

/// Caller side of the deferred-error channel.
#[derive(Debug)]
pub struct DeferredErrors {
    rx: mpsc::UnboundedReceiver<KmsError>,
}

impl DeferredErrors {
    /// Waits for the next error. `None` once every sink is dropped.
    pub async fn next(&mut self) -> Option<KmsError> {
        self.rx.recv().await
    }

    /// Returns an already delivered error without waiting.
    pub fn try_next(&mut self) -> Option<KmsError> {
        self.rx.try_recv().ok()
    }
}

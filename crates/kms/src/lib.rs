pub mod error;
pub mod local;
pub mod options;
pub mod registry;
pub mod signing;

pub use error::{KmsError, Result};
pub use options::{RpcAuth, RpcAuthOidc, RpcOptions};
pub use registry::{InitFuture, ProviderInit, Registry};
pub use signing::{
    CryptoSigner, DeferredErrors, DigestSigner, ErrorSink, HashAlgorithm, Padding, PublicKey,
    SignerOpts, SignerVerifier, deferred_errors,
};
pub use tokio_util::sync::CancellationToken;

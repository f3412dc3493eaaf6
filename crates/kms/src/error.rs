use crate::signing::HashAlgorithm;

pub type Result<T, E = KmsError> = std::result::Result<T, E>;

/// Errors surfaced by the registry and by KMS backends.
///
/// The registry itself only ever raises [`KmsError::NoProviderFound`].
/// Every other variant comes from a backend and is handed back to the
/// caller exactly as the backend produced it.
#[derive(Debug, thiserror::Error)]
pub enum KmsError {
    #[error("no provider found for that key reference: {key_resource_id}")]
    NoProviderFound { key_resource_id: String },
    #[error("invalid key reference {key_resource_id:?}: {reason}")]
    InvalidKeyReference {
        key_resource_id: String,
        reason: String,
    },
    #[error("unsupported algorithm {algorithm:?}, expected one of: {}", .supported.join(", "))]
    UnsupportedAlgorithm {
        algorithm: String,
        supported: Vec<String>,
    },
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedHashAlgorithm(HashAlgorithm),
    #[error("invalid signature")]
    InvalidSignature,
    /// A signing primitive failed, or the digest did not fit the hash.
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl KmsError {
    pub(crate) fn invalid_key_reference(
        key_resource_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidKeyReference {
            key_resource_id: key_resource_id.into(),
            reason: reason.into(),
        }
    }

    /// True when the registry had nothing registered for the identifier.
    pub fn is_no_provider(&self) -> bool {
        matches!(self, Self::NoProviderFound { .. })
    }
}

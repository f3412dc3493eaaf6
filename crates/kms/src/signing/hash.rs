use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::{KmsError, Result};

/// Hash function a backend should use when digesting messages.
///
/// `Unspecified` is the zero value; callers pass it when they have no
/// preference and the backend picks its own default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Unspecified,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Digest length in bytes, `None` when unspecified.
    pub fn size(self) -> Option<usize> {
        match self {
            Self::Unspecified => None,
            Self::Sha256 => Some(32),
            Self::Sha384 => Some(48),
            Self::Sha512 => Some(64),
        }
    }

    pub fn is_specified(self) -> bool {
        self != Self::Unspecified
    }

    /// Returns `self`, or `fallback` when unspecified.
    pub fn or(self, fallback: HashAlgorithm) -> HashAlgorithm {
        if self.is_specified() { self } else { fallback }
    }

    pub fn digest(self, message: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Unspecified => Err(KmsError::UnsupportedHashAlgorithm(self)),
            Self::Sha256 => Ok(Sha256::digest(message).to_vec()),
            Self::Sha384 => Ok(Sha384::digest(message).to_vec()),
            Self::Sha512 => Ok(Sha512::digest(message).to_vec()),
        }
    }

    /// Checks that `digest` has the length this hash produces.
    pub fn check_digest(self, digest: &[u8]) -> Result<()> {
        match self.size() {
            Some(size) if size == digest.len() => Ok(()),
            Some(size) => Err(KmsError::Signing(format!(
                "{self} digest must be {size} bytes, got {}",
                digest.len()
            ))),
            None => Err(KmsError::UnsupportedHashAlgorithm(self)),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "" | "unspecified" => Ok(Self::Unspecified),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => Err(format!("unknown hash algorithm: {other}")),
        }
    }
}

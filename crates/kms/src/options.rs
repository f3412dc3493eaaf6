use std::fmt;

use serde::{Deserialize, Serialize};

/// Options forwarded to a backend constructor.
///
/// Backends read the fields they understand and ignore the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcOptions {
    /// Verify signatures at the backend instead of locally.
    pub remote_verification: bool,
    pub auth: Option<RpcAuth>,
    /// Key version to sign with, backend-defined format.
    pub key_version: Option<String>,
}

impl RpcOptions {
    pub fn with_remote_verification(mut self, remote_verification: bool) -> Self {
        self.remote_verification = remote_verification;
        self
    }

    pub fn with_auth(mut self, auth: RpcAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_key_version(mut self, key_version: impl Into<String>) -> Self {
        self.key_version = Some(key_version.into());
        self
    }
}

/// Credentials for backends that sit behind an authenticated RPC endpoint.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcAuth {
    pub address: String,
    pub path: String,
    pub role: String,
    pub token: String,
    pub oidc: Option<RpcAuthOidc>,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcAuthOidc {
    pub path: String,
    pub role: String,
    pub token: String,
}

fn redact(token: &str) -> &'static str {
    if token.is_empty() { "" } else { "<redacted>" }
}

impl fmt::Debug for RpcAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcAuth")
            .field("address", &self.address)
            .field("path", &self.path)
            .field("role", &self.role)
            .field("token", &redact(&self.token))
            .field("oidc", &self.oidc)
            .finish()
    }
}

impl fmt::Debug for RpcAuthOidc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcAuthOidc")
            .field("path", &self.path)
            .field("role", &self.role)
            .field("token", &redact(&self.token))
            .finish()
    }
}

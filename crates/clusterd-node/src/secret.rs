//! Secret authority — issues and checks the cluster join secret.
//!
//! The secret is a bearer token: whoever presents it may join. Nodes
//! persist only its SHA-256 digest and compare digests in constant time.
//! The founder issues it on `create`; joining nodes adopt the digest of
//! the secret they were admitted with, so every active member can admit
//! later joiners. `destroy` drops the digest, ending the epoch.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use clusterd_state::LocalRecord;

use crate::error::{ClusterError, ClusterResult};

/// Number of random bytes in a freshly issued secret.
const SECRET_BYTES: usize = 32;

/// An opaque join secret. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Hex SHA-256 of the secret value.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

#[derive(Debug, Default)]
pub struct SecretAuthority;

impl SecretAuthority {
    pub fn new() -> Self {
        Self
    }

    /// Generate the secret for a new cluster epoch.
    ///
    /// Returns the secret (to hand back to the orchestrator once) and
    /// the digest to persist. Fails if `record` still holds a live secret.
    pub fn issue(&self, record: &LocalRecord) -> ClusterResult<(Secret, String)> {
        if record.secret_digest.is_some() {
            return Err(ClusterError::AlreadyInitialized(
                "a join secret is already live on this node".to_string(),
            ));
        }
        let mut bytes = [0u8; SECRET_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let secret = Secret(hex::encode(bytes));
        let digest = secret.digest();
        Ok((secret, digest))
    }

    /// Digest to persist for a secret this node was admitted with.
    pub fn adopt(&self, secret: &Secret) -> String {
        secret.digest()
    }

    /// Whether `candidate` matches the live secret in `record`.
    /// A record with no live secret rejects everything.
    pub fn validate(&self, record: &LocalRecord, candidate: &Secret) -> bool {
        match &record.secret_digest {
            Some(live) => {
                let offered = candidate.digest();
                live.as_bytes().ct_eq(offered.as_bytes()).into()
            }
            None => false,
        }
    }
}

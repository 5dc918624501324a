//! Error taxonomy of the coordination protocol.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use clusterd_state::{DescriptorError, StateError};

/// Result type alias for node agent operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Every way a command can fail. All failures are local and definite;
/// the agent never retries on the caller's behalf.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClusterError {
    #[error("node is already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("node is already a cluster member: {0}")]
    AlreadyMember(String),

    #[error("node is not active: {0}")]
    NotActive(String),

    #[error("join secret rejected")]
    InvalidSecret,

    #[error("no reachable active member: {0}")]
    NoReachableMembers(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("state store failure: {0}")]
    Storage(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Stable, machine-readable name of a [`ClusterError`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorKind {
    AlreadyInitialized,
    AlreadyMember,
    NotActive,
    InvalidSecret,
    NoReachableMembers,
    Timeout,
    MalformedInput,
    Storage,
    Transport,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyInitialized => "AlreadyInitialized",
            Self::AlreadyMember => "AlreadyMember",
            Self::NotActive => "NotActive",
            Self::InvalidSecret => "InvalidSecret",
            Self::NoReachableMembers => "NoReachableMembers",
            Self::Timeout => "Timeout",
            Self::MalformedInput => "MalformedInput",
            Self::Storage => "Storage",
            Self::Transport => "Transport",
            Self::Internal => "Internal",
        }
    }
}

/// Error as carried in HTTP response envelopes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ClusterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyInitialized(_) => ErrorKind::AlreadyInitialized,
            Self::AlreadyMember(_) => ErrorKind::AlreadyMember,
            Self::NotActive(_) => ErrorKind::NotActive,
            Self::InvalidSecret => ErrorKind::InvalidSecret,
            Self::NoReachableMembers(_) => ErrorKind::NoReachableMembers,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::MalformedInput(_) => ErrorKind::MalformedInput,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether a peer returning this error should simply be skipped
    /// while looking for an admitting member.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::NotActive(_) | Self::Transport(_) | Self::Timeout(_) | Self::Storage(_)
        )
    }

    /// The variant's own detail, without the kind prefix of `Display`.
    pub fn detail(&self) -> String {
        match self {
            Self::AlreadyInitialized(m)
            | Self::AlreadyMember(m)
            | Self::NotActive(m)
            | Self::NoReachableMembers(m)
            | Self::Timeout(m)
            | Self::MalformedInput(m)
            | Self::Storage(m)
            | Self::Transport(m)
            | Self::Internal(m) => m.clone(),
            Self::InvalidSecret => self.to_string(),
        }
    }

    pub fn to_wire(&self) -> WireError {
        WireError {
            kind: self.kind(),
            message: self.detail(),
        }
    }

    /// Rebuild an error received over the wire.
    pub fn from_wire(wire: WireError) -> Self {
        let WireError { kind, message } = wire;
        match kind {
            ErrorKind::AlreadyInitialized => Self::AlreadyInitialized(message),
            ErrorKind::AlreadyMember => Self::AlreadyMember(message),
            ErrorKind::NotActive => Self::NotActive(message),
            ErrorKind::InvalidSecret => Self::InvalidSecret,
            ErrorKind::NoReachableMembers => Self::NoReachableMembers(message),
            ErrorKind::Timeout => Self::Timeout(message),
            ErrorKind::MalformedInput => Self::MalformedInput(message),
            ErrorKind::Storage => Self::Storage(message),
            ErrorKind::Transport => Self::Transport(message),
            ErrorKind::Internal => Self::Internal(message),
        }
    }
}

impl From<StateError> for ClusterError {
    fn from(e: StateError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<DescriptorError> for ClusterError {
    fn from(e: DescriptorError) -> Self {
        Self::MalformedInput(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip_is_lossless() {
        let errors = [
            ClusterError::AlreadyInitialized("founder".into()),
            ClusterError::AlreadyMember("member".into()),
            ClusterError::NotActive("destroyed".into()),
            ClusterError::InvalidSecret,
            ClusterError::NoReachableMembers("cluster1".into()),
            ClusterError::MalformedInput("bad json".into()),
        ];
        for err in errors {
            let back = ClusterError::from_wire(err.to_wire());
            assert_eq!(back, err);
        }
    }

    #[test]
    fn wire_message_carries_detail_only() {
        let wire = ClusterError::Timeout("join after 10s".into()).to_wire();
        assert_eq!(wire.kind, ErrorKind::Timeout);
        assert_eq!(wire.message, "join after 10s");
        assert_eq!(ClusterError::InvalidSecret.to_wire().message, "join secret rejected");
    }

    #[test]
    fn kind_serializes_by_name() {
        let json = serde_json::to_string(&ErrorKind::NoReachableMembers).unwrap();
        assert_eq!(json, "\"NoReachableMembers\"");
        assert_eq!(ErrorKind::InvalidSecret.as_str(), "InvalidSecret");
    }

    #[test]
    fn unreachable_classification() {
        assert!(ClusterError::Transport("refused".into()).is_unreachable());
        assert!(ClusterError::NotActive("shutting_down".into()).is_unreachable());
        assert!(!ClusterError::InvalidSecret.is_unreachable());
    }
}

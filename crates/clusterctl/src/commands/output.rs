//! What a command prints.
//!
//! Orchestrator scripts parse stdout, so each command prints exactly one
//! result: `S(<secret>)`, `N`, diagnostics text, or a failure array
//! `["<ErrorKind>","<message>"]`.

use std::fmt;

use clusterd_node::ClusterError;

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Join secret from `create`.
    Secret(String),
    /// Success without a value.
    Null,
    /// Free-form text, e.g. diagnostics.
    Text(String),
    Failure(ClusterError),
}

impl Reply {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secret(secret) => write!(f, "S({secret})"),
            Self::Null => write!(f, "N"),
            Self::Text(text) => write!(f, "{text}"),
            Self::Failure(err) => {
                write!(f, "{}", serde_json::json!([err.kind().as_str(), err.detail()]))
            }
        }
    }
}

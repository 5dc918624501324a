//! Request and response bodies of the HTTP surface.
//!
//! Every response is wrapped in an [`ApiResponse`] envelope; failures
//! carry a [`WireError`] so the typed error survives the hop.

use serde::{Deserialize, Serialize};

use clusterd_state::{MemberRecord, NodeDescriptor};

use crate::error::{ClusterError, ClusterResult, WireError};
use crate::secret::Secret;

pub const CREATE_PATH: &str = "/v1/create";
pub const JOIN_PATH: &str = "/v1/join";
pub const SHUTDOWN_PATH: &str = "/v1/shutdown";
pub const DESTROY_PATH: &str = "/v1/destroy";
pub const DIAGNOSTICS_PATH: &str = "/v1/diagnostics";
pub const ADMIT_PATH: &str = "/v1/peer/admit";
pub const ANNOUNCE_PATH: &str = "/v1/peer/announce";
pub const HEALTH_PATH: &str = "/healthz";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    pub descriptor: NodeDescriptor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResponse {
    pub secret: Secret,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub secret: Secret,
    pub descriptor: NodeDescriptor,
    pub existing: Vec<NodeDescriptor>,
}

/// Sent by a joining node to a listed member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmitRequest {
    pub secret: Secret,
    pub joiner: NodeDescriptor,
}

/// An admitting member's answer: who it is and its membership view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdmitReply {
    pub responder: String,
    pub members: Vec<MemberRecord>,
}

/// Sent by a node that just joined to every other member of its view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnounceRequest {
    pub secret: Secret,
    pub member: MemberRecord,
}

/// Response wrapper for a consistent API format.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(err: &ClusterError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_wire()),
        }
    }
}

impl ApiResponse<serde_json::Value> {
    /// Unwrap a decoded envelope into the typed result it carries.
    pub fn into_result<T: serde::de::DeserializeOwned>(self) -> ClusterResult<T> {
        if self.success {
            let data = self.data.unwrap_or(serde_json::Value::Null);
            serde_json::from_value(data)
                .map_err(|e| ClusterError::Transport(format!("unexpected response payload: {e}")))
        } else {
            Err(self.error.map(ClusterError::from_wire).unwrap_or_else(|| {
                ClusterError::Transport("failure response without error detail".to_string())
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn decode(json: &str) -> ApiResponse<serde_json::Value> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn unit_success_decodes_from_null_data() {
        let json = serde_json::to_string(&ApiResponse::ok(())).unwrap();
        let result: ClusterResult<()> = decode(&json).into_result();
        assert!(result.is_ok());
    }

    #[test]
    fn typed_success_decodes() {
        let json = serde_json::to_string(&ApiResponse::ok(CreateResponse {
            secret: Secret::new("s3cr3t"),
        }))
        .unwrap();
        let resp: CreateResponse = decode(&json).into_result().unwrap();
        assert_eq!(resp.secret.expose(), "s3cr3t");
    }

    #[test]
    fn failure_decodes_to_typed_error() {
        let json =
            serde_json::to_string(&ApiResponse::<()>::failure(&ClusterError::InvalidSecret)).unwrap();
        assert!(json.contains("InvalidSecret"));
        let err = decode(&json).into_result::<()>().unwrap_err();
        assert_eq!(err, ClusterError::InvalidSecret);
    }

    #[test]
    fn failure_without_detail_is_transport_error() {
        let err = decode(r#"{"success":false}"#).into_result::<()>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}

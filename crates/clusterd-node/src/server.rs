//! HTTP surface of a node agent.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/v1/create` | Found a cluster, returns the join secret |
//! | POST | `/v1/join` | Join via the listed members |
//! | POST | `/v1/shutdown` | Stop serving cluster traffic |
//! | POST | `/v1/destroy` | Leave the cluster (idempotent) |
//! | GET | `/v1/diagnostics` | Snapshot of the node |
//! | POST | `/v1/peer/admit` | Peer: validate a joiner's secret |
//! | POST | `/v1/peer/announce` | Peer: record a new member |
//! | GET | `/healthz` | Liveness |
//!
//! Commands run on their own task, so a caller that disconnects does
//! not cancel a transition halfway.

use std::future::Future;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Serialize;
use tracing::error;

use crate::agent::NodeAgent;
use crate::error::{ClusterError, ClusterResult};
use crate::peer::PeerClient;
use crate::wire::*;

type AgentState<P> = State<Arc<NodeAgent<P>>>;

/// Build the router serving `agent`.
pub fn build_router<P: PeerClient>(agent: Arc<NodeAgent<P>>) -> Router {
    Router::new()
        .route(CREATE_PATH, post(create::<P>))
        .route(JOIN_PATH, post(join::<P>))
        .route(SHUTDOWN_PATH, post(shutdown::<P>))
        .route(DESTROY_PATH, post(destroy::<P>))
        .route(DIAGNOSTICS_PATH, get(diagnostics::<P>))
        .route(ADMIT_PATH, post(admit::<P>))
        .route(ANNOUNCE_PATH, post(announce::<P>))
        .route(HEALTH_PATH, get(healthz))
        .with_state(agent)
}

fn status_for(err: &ClusterError) -> StatusCode {
    match err {
        ClusterError::AlreadyInitialized(_)
        | ClusterError::AlreadyMember(_)
        | ClusterError::NotActive(_) => StatusCode::CONFLICT,
        ClusterError::InvalidSecret => StatusCode::FORBIDDEN,
        ClusterError::NoReachableMembers(_) => StatusCode::SERVICE_UNAVAILABLE,
        ClusterError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        ClusterError::MalformedInput(_) => StatusCode::BAD_REQUEST,
        ClusterError::Transport(_) => StatusCode::BAD_GATEWAY,
        ClusterError::Storage(_) | ClusterError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond<T: Serialize>(result: ClusterResult<T>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))).into_response(),
        Err(e) => (status_for(&e), Json(ApiResponse::<()>::failure(&e))).into_response(),
    }
}

fn rejected(rejection: JsonRejection) -> Response {
    respond::<()>(Err(ClusterError::MalformedInput(rejection.body_text())))
}

/// Run `op` to completion on its own task.
async fn detached<T, F>(op: F) -> ClusterResult<T>
where
    T: Send + 'static,
    F: Future<Output = ClusterResult<T>> + Send + 'static,
{
    match tokio::spawn(op).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "command task failed");
            Err(ClusterError::Internal(format!("command task failed: {e}")))
        }
    }
}

// ── Commands ───────────────────────────────────────────────────────

async fn create<P: PeerClient>(
    State(agent): AgentState<P>,
    payload: Result<Json<CreateRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return rejected(rejection),
    };
    let result = detached(async move { agent.create(req.descriptor).await }).await;
    respond(result.map(|secret| CreateResponse { secret }))
}

async fn join<P: PeerClient>(
    State(agent): AgentState<P>,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return rejected(rejection),
    };
    let result = detached(async move {
        agent
            .join(req.secret, req.descriptor, req.existing)
            .await
            .map(|_| ())
    })
    .await;
    respond(result)
}

async fn shutdown<P: PeerClient>(State(agent): AgentState<P>) -> Response {
    respond(detached(async move { agent.shutdown().await }).await)
}

async fn destroy<P: PeerClient>(State(agent): AgentState<P>) -> Response {
    respond(detached(async move { agent.destroy().await }).await)
}

async fn diagnostics<P: PeerClient>(State(agent): AgentState<P>) -> Response {
    respond(agent.diagnostics().await)
}

// ── Peer requests ──────────────────────────────────────────────────

async fn admit<P: PeerClient>(
    State(agent): AgentState<P>,
    payload: Result<Json<AdmitRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(req)) => respond(agent.admit(&req).await),
        Err(rejection) => rejected(rejection),
    }
}

async fn announce<P: PeerClient>(
    State(agent): AgentState<P>,
    payload: Result<Json<AnnounceRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(req)) => respond(agent.announce(&req).await),
        Err(rejection) => rejected(rejection),
    }
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use std::time::Duration;

    use clusterd_state::{LifecycleState, MemberRecord, NodeDescriptor, NodeId, StateStore};
    use tokio::sync::Notify;

    use super::*;
    use crate::agent::AgentConfig;
    use crate::peer::LocalNetwork;

    fn router() -> Router {
        let store = StateStore::open_in_memory().unwrap();
        let agent = Arc::new(NodeAgent::new(store, LocalNetwork::new(), AgentConfig::default()));
        build_router(agent)
    }

    async fn call(app: &Router, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(path);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn founder() -> Value {
        json!({ "descriptor": { "hostname": "cluster1", "addresses": ["10.0.0.1"] } })
    }

    #[tokio::test]
    async fn create_returns_secret() {
        let app = router();
        let (status, body) = call(&app, Method::POST, CREATE_PATH, Some(founder())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(!body["data"]["secret"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_create_conflicts() {
        let app = router();
        call(&app, Method::POST, CREATE_PATH, Some(founder())).await;
        let (status, body) = call(&app, Method::POST, CREATE_PATH, Some(founder())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["kind"], "AlreadyInitialized");
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let app = router();
        let (status, body) = call(
            &app,
            Method::POST,
            JOIN_PATH,
            Some(json!({ "descriptor": "cluster2" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "MalformedInput");
    }

    #[tokio::test]
    async fn blank_hostname_is_bad_request() {
        let app = router();
        let (status, body) = call(
            &app,
            Method::POST,
            CREATE_PATH,
            Some(json!({ "descriptor": { "hostname": "", "addresses": [] } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "MalformedInput");
    }

    #[tokio::test]
    async fn diagnostics_reports_state() {
        let app = router();
        let (status, body) = call(&app, Method::GET, DIAGNOSTICS_PATH, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["state"], "uninitialized");
        assert!(body["data"]["node_id"].is_null());
    }

    #[tokio::test]
    async fn destroy_on_fresh_node_succeeds() {
        let app = router();
        let (status, body) = call(&app, Method::POST, DESTROY_PATH, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn shutdown_on_fresh_node_conflicts() {
        let app = router();
        let (status, body) = call(&app, Method::POST, SHUTDOWN_PATH, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["kind"], "NotActive");
    }

    #[tokio::test]
    async fn admit_with_wrong_secret_is_forbidden() {
        let app = router();
        call(&app, Method::POST, CREATE_PATH, Some(founder())).await;
        let (status, body) = call(
            &app,
            Method::POST,
            ADMIT_PATH,
            Some(json!({
                "secret": "bogus",
                "joiner": { "hostname": "cluster2", "addresses": ["10.0.0.2"] }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["kind"], "InvalidSecret");
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let app = router();
        let resp = app
            .oneshot(Request::get(HEALTH_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    /// Holds every admission until released, signalling when one arrives.
    #[derive(Clone, Default)]
    struct GatedPeer {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    impl PeerClient for GatedPeer {
        fn admit(
            &self,
            _address: &str,
            _request: &AdmitRequest,
        ) -> impl Future<Output = ClusterResult<AdmitReply>> + Send {
            let gate = self.clone();
            async move {
                gate.entered.notify_one();
                gate.release.notified().await;
                Ok(AdmitReply {
                    responder: "cluster1".to_string(),
                    members: vec![MemberRecord {
                        descriptor: NodeDescriptor::new("cluster1", vec!["10.0.0.1".into()]),
                        node_id: Some(NodeId::new(1, 1)),
                        joined_at: 0,
                    }],
                })
            }
        }

        fn announce(
            &self,
            _address: &str,
            _request: &AnnounceRequest,
        ) -> impl Future<Output = ClusterResult<()>> + Send {
            std::future::ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn join_commits_after_caller_disconnects() {
        let gate = GatedPeer::default();
        let agent = Arc::new(NodeAgent::new(
            StateStore::open_in_memory().unwrap(),
            gate.clone(),
            AgentConfig::default(),
        ));
        let app = build_router(agent.clone());

        let body = json!({
            "secret": "abc",
            "descriptor": { "hostname": "cluster2", "addresses": ["10.0.0.2"] },
            "existing": [{ "hostname": "cluster1", "addresses": ["10.0.0.1"] }]
        });
        let req = Request::builder()
            .method(Method::POST)
            .uri(JOIN_PATH)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let caller = tokio::spawn(app.oneshot(req));

        // The join is in flight at the peer; the caller goes away.
        gate.entered.notified().await;
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());
        gate.release.notify_one();

        let mut state = LifecycleState::Uninitialized;
        for _ in 0..100 {
            state = agent.diagnostics().await.unwrap().state;
            if state == LifecycleState::Member {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(state, LifecycleState::Member);
        assert!(agent.diagnostics().await.unwrap().node_id.is_some());
    }
}

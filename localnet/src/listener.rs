//! HTTP listener exposing provisioned chains at `/{index}`.
//!
//! Requests to `POST /{index}` are forwarded verbatim to the node backing the
//! chain provisioned at that index; the node's response is returned as is.

use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{Method, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::Span;
use url::Url;

use crate::error::{Error, Result};

/// Host the listener binds and exported RPC URLs name.
pub const LISTEN_HOST: &str = "localhost";

#[derive(Debug)]
struct ListenerState {
    upstreams: RwLock<Vec<Url>>,
    client: reqwest::Client,
}

impl ListenerState {
    fn upstream(&self, index: usize) -> Option<Url> {
        self.upstreams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }

    fn len(&self) -> usize {
        self.upstreams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

type SharedState = Arc<ListenerState>;

/// Span per proxied request, tagged with the requested path.
#[derive(Clone, Copy, Debug)]
struct RpcMakeSpan;

impl<B> MakeSpan<B> for RpcMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::debug_span!(
            "rpc_request",
            otel.kind = "server",
            method = %request.method(),
            path = %request.uri().path(),
        )
    }
}

fn routes() -> Router<SharedState> {
    Router::new()
        .route("/health", get(get_health))
        .route("/{index}", post(post_rpc))
}

/// `GET /health`: liveness and the number of routed chains.
async fn get_health(State(state): State<SharedState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "chains": state.len() })),
    )
}

/// `POST /{index}`: forward a JSON-RPC body to the chain's node.
async fn post_rpc(
    State(state): State<SharedState>,
    Path(index): Path<usize>,
    body: Bytes,
) -> Response {
    let Some(upstream) = state.upstream(index) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no chain at index {index}") })),
        )
            .into_response();
    };

    let forwarded = state
        .client
        .post(upstream)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await;
    let response = match forwarded {
        Ok(response) => response,
        Err(error) => {
            tracing::warn!(index, %error, "upstream node unreachable");
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": error.to_string() })),
            )
                .into_response();
        }
    };

    let status = response.status();
    match response.bytes().await {
        Ok(bytes) => (status, [(header::CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(error) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": error.to_string() })),
        )
            .into_response(),
    }
}

/// Running listener; stops serving when [`ListenerHandle::stop`] is called.
#[derive(Debug)]
pub struct ListenerHandle {
    addr: SocketAddr,
    state: SharedState,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Binds `localhost:port` and starts routing to `upstreams`, where
    /// `upstreams[i]` serves `/{i}`. Port `0` picks a free port.
    ///
    /// The host is resolved the same way clients resolve the exported
    /// `http://localhost:{port}/{index}` URLs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Listener`] if the port cannot be bound.
    pub async fn bind(port: u16, upstreams: Vec<Url>) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind((LISTEN_HOST, port))
            .await
            .inspect_err(|e| tracing::error!("Failed to bind to {LISTEN_HOST}:{port}: {e}"))
            .map_err(Error::Listener)?;
        let addr = listener.local_addr().map_err(Error::Listener)?;

        let state = Arc::new(ListenerState {
            upstreams: RwLock::new(upstreams),
            client: reqwest::Client::new(),
        });
        let app = routes()
            .with_state(Arc::clone(&state))
            .layer(TraceLayer::new_for_http().make_span_with(RpcMakeSpan))
            .layer(
                cors::CorsLayer::new()
                    .allow_origin(cors::Any)
                    .allow_methods([Method::GET, Method::POST])
                    .allow_headers(cors::Any),
            );

        let token = CancellationToken::new();
        let shutdown = token.clone();
        let task = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(error) = served {
                tracing::error!(%error, "listener stopped unexpectedly");
            }
        });

        tracing::info!("Serving chains at http://{}", addr);
        Ok(Self {
            addr,
            state,
            token,
            task,
        })
    }

    /// Address actually bound.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Port actually bound; differs from the requested one when that was `0`.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Routes the next index to `upstream` and returns that index.
    pub fn push_upstream(&self, upstream: Url) -> usize {
        let mut upstreams = self
            .state
            .upstreams
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        upstreams.push(upstream);
        upstreams.len() - 1
    }

    /// Stops accepting requests and waits for the server task to end.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(error) = self.task.await {
            tracing::warn!(%error, "listener task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::chain::rpc_url;

    async fn fake_node() -> (SocketAddr, JoinHandle<()>) {
        let app = Router::new().route(
            "/",
            post(|body: Bytes| async move {
                let request: serde_json::Value = serde_json::from_slice(&body).unwrap_or_default();
                Json(json!({ "jsonrpc": "2.0", "id": request["id"], "result": "0x2a" }))
            }),
        );
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind fake node");
        let addr = listener.local_addr().expect("addr");
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve fake node");
        });
        (addr, task)
    }

    #[tokio::test]
    async fn forwards_to_indexed_chain() {
        let (node_addr, node) = fake_node().await;
        let upstream = Url::parse(&format!("http://{node_addr}/")).expect("url");
        let listener = ListenerHandle::bind(0, vec![upstream]).await.expect("bind");

        let response: serde_json::Value = reqwest::Client::new()
            .post(format!("http://{}/0", listener.local_addr()))
            .json(&json!({ "jsonrpc": "2.0", "id": 7, "method": "eth_chainId", "params": [] }))
            .send()
            .await
            .expect("request")
            .json()
            .await
            .expect("json body");
        assert_eq!(response["result"], "0x2a");
        assert_eq!(response["id"], 7);

        listener.stop().await;
        node.abort();
    }

    #[tokio::test]
    async fn exported_url_reaches_chain_added_after_bind() {
        let (node_addr, node) = fake_node().await;
        let listener = ListenerHandle::bind(0, Vec::new()).await.expect("bind");
        assert_ne!(listener.port(), 0);

        let upstream = Url::parse(&format!("http://{node_addr}/")).expect("url");
        assert_eq!(listener.push_upstream(upstream), 0);

        let client = reqwest::Client::new();
        let response: serde_json::Value = client
            .post(rpc_url(listener.port(), 0))
            .json(&json!({ "jsonrpc": "2.0", "id": 1, "method": "eth_chainId", "params": [] }))
            .send()
            .await
            .expect("request")
            .json()
            .await
            .expect("json body");
        assert_eq!(response["result"], "0x2a");

        let health: serde_json::Value = client
            .get(format!("http://{}/health", listener.local_addr()))
            .send()
            .await
            .expect("request")
            .json()
            .await
            .expect("json body");
        assert_eq!(health["chains"], 1);

        listener.stop().await;
        node.abort();
    }

    #[tokio::test]
    async fn unknown_index_is_not_found() {
        let listener = ListenerHandle::bind(0, Vec::new()).await.expect("bind");
        let status = reqwest::Client::new()
            .post(format!("http://{}/3", listener.local_addr()))
            .body("{}")
            .send()
            .await
            .expect("request")
            .status();
        assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
        listener.stop().await;
    }

    #[tokio::test]
    async fn stop_releases_the_port() {
        let listener = ListenerHandle::bind(0, Vec::new()).await.expect("bind");
        let addr = listener.local_addr();
        listener.stop().await;

        let rebound = tokio::net::TcpListener::bind(addr).await;
        assert!(rebound.is_ok());
    }
}

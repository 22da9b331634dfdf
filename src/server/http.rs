//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Each accepted TCP
//! connection is served on its own task so no connection's events can block
//! another's; the real-time endpoint upgrades in place via
//! `hyper_tungstenite`.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::events::EventRouter;
use crate::gateway::{self, ConnectionGateway};
use crate::identity::IdentityResolver;
use crate::presence::PresenceDirectory;
use crate::routes;
use crate::store::KeyValueStore;
use crate::types::Result;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// The injected credential/presence cache
    pub store: Arc<dyn KeyValueStore>,
    /// Identity resolver over the credential cache. The gateway holds its own
    /// handle; this one is the surface write-side callers use to issue and
    /// revoke credentials.
    pub identity: Arc<IdentityResolver>,
    /// Presence directory over the same cache, for collaborators that need a
    /// reachability answer without going through the gateway.
    pub presence: Arc<PresenceDirectory>,
    /// Connection gateway (registry + lifecycle + send primitives)
    pub gateway: Arc<ConnectionGateway>,
    /// Write-side trigger points for real-time events
    pub router: Arc<EventRouter>,
}

impl AppState {
    /// Wire all services over one injected store
    pub fn new(args: Args, store: Arc<dyn KeyValueStore>) -> Self {
        let identity = Arc::new(IdentityResolver::new(
            Arc::clone(&store),
            args.auth_ttl(),
            args.verification_ttl(),
        ));
        let presence = Arc::new(PresenceDirectory::new(Arc::clone(&store)));
        let gateway = Arc::new(ConnectionGateway::new(
            args.max_connections,
            Arc::clone(&presence),
            Arc::clone(&identity),
        ));
        let router = Arc::new(EventRouter::new(Arc::clone(&gateway)));

        Self {
            args,
            store,
            identity,
            presence,
            gateway,
            router,
        }
    }
}

/// Bind the configured address and start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Switchboard listening on {} as node {}",
        state.args.listen, state.args.node_id
    );
    info!(
        "Real-time endpoint enabled at /ws (max {} connections)",
        state.args.max_connections
    );

    serve(listener, state).await
}

/// Accept loop over an already-bound listener
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .with_upgrades()
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match (method, path.as_str()) {
        // Real-time connection endpoint
        (Method::GET, "/ws") => {
            if hyper_tungstenite::is_upgrade_request(&req) {
                to_boxed(
                    gateway::handle_gateway_upgrade(Arc::clone(&state.gateway), req, addr).await,
                )
            } else {
                warn!("Non-upgrade request to /ws from {}", addr);
                to_boxed(bad_request_response("WebSocket upgrade required for /ws"))
            }
        }

        // Liveness probe - returns 200 if switchboard is running
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            to_boxed(routes::health_check(Arc::clone(&state)))
        }

        // Readiness probe - returns 200 only if the cache answers
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            to_boxed(routes::readiness_check(Arc::clone(&state)).await)
        }

        // Version info for deployment verification
        (Method::GET, "/version") => to_boxed(routes::version_info()),

        // Runtime stats (connection count, capacity)
        (Method::GET, "/status") => to_boxed(routes::status_check(Arc::clone(&state))),

        // CORS preflight
        (Method::OPTIONS, _) => to_boxed(preflight_response()),

        _ => to_boxed(not_found_response(&path)),
    };

    Ok(response)
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
        "hint": "Use WebSocket connection to /ws"
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Bad request response
fn bad_request_response(message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Bad Request",
        "message": message
    });

    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

//! HTTP server setup and dispatch.
//!
//! # Responsibilities
//! - Create Axum Router with a single catch-all dispatcher
//! - Wire up middleware (tracing, request ID, optional CORS)
//! - Match requests against the route table
//! - Translate request → event → invocation → response
//! - Record invocation metrics
//!
//! # Design Decisions
//! - Routes come from the infrastructure description, so axum only sees
//!   `/` and `/{*path}`; matching is done by `RouteTable`
//! - Every request gets a well-formed response: 404/405 when unrouted,
//!   413/400 for unreadable bodies, an `InvocationResult` otherwise

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::event::{GatewayRequest, InvocationResult, PayloadVersion};
use crate::invocation::InvocationEngine;
use crate::observability::metrics;
use crate::routing::{RouteMatch, RouteTable};

/// Header carrying the per-request id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub engine: Arc<InvocationEngine>,
    pub payload_version: PayloadVersion,
    pub max_body_bytes: usize,
}

/// HTTP front end of the gateway.
pub struct GatewayServer {
    router: Router,
    routes: Arc<RouteTable>,
}

impl GatewayServer {
    /// Create a server over a frozen route table.
    pub fn new(routes: RouteTable, engine: InvocationEngine, config: &GatewayConfig) -> Self {
        let routes = Arc::new(routes);
        let state = AppState {
            routes: Arc::clone(&routes),
            engine: Arc::new(engine),
            payload_version: config.invocation.payload_version,
            max_body_bytes: config.invocation.max_body_bytes,
        };

        let router = Self::build_router(state, config.cors.enabled);
        Self { router, routes }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(state: AppState, cors: bool) -> Router {
        let router = Router::new()
            .route("/", any(dispatch))
            .route("/{*path}", any(dispatch))
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

        if cors {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// The router, for serving in-memory (tests, embedding).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, routes = self.routes.len(), "Gateway listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Catch-all handler: route, translate, invoke, translate back.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let (endpoint, path_parameters) = match state.routes.lookup(&method, &path) {
        RouteMatch::Found {
            endpoint,
            path_parameters,
        } => (endpoint.clone(), path_parameters),
        RouteMatch::MethodNotAllowed { allowed } => {
            tracing::warn!(request_id = %request_id, method = %method, path = %path, "Method not allowed");
            metrics::record_unmatched(405);
            let allow = allowed
                .iter()
                .map(|m| m.as_str().to_ascii_uppercase())
                .collect::<Vec<_>>()
                .join(", ");
            let mut response = (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response();
            if let Ok(value) = HeaderValue::from_str(&allow) {
                response.headers_mut().insert(header::ALLOW, value);
            }
            return response;
        }
        RouteMatch::NotFound => {
            tracing::warn!(request_id = %request_id, method = %method, path = %path, "No route matched");
            metrics::record_unmatched(404);
            return (StatusCode::NOT_FOUND, "No matching route found").into_response();
        }
    };

    tracing::debug!(
        request_id = %request_id,
        route = %endpoint.route_key(),
        handler = %endpoint.handler,
        "Dispatching request"
    );

    let gateway_request = match GatewayRequest::from_http(request, state.max_body_bytes).await {
        Ok(request) => request
            .with_path_parameters(path_parameters)
            .with_request_id(request_id.clone()),
        Err(err) => {
            tracing::warn!(request_id = %request_id, error = %err, "Rejected request body");
            return err.into_response();
        }
    };

    let event = gateway_request.to_event(state.payload_version);
    tracing::trace!(
        request_id = %request_id,
        payload_version = %event.version(),
        body_bytes = event.body().len(),
        "Built event"
    );

    let event = match event.to_json() {
        Ok(event) => event,
        Err(err) => {
            tracing::error!(request_id = %request_id, error = %err, "Failed to encode event");
            return InvocationResult::handler_error().into_response();
        }
    };

    let invocation = state.engine.invoke(&endpoint, event, &request_id).await;
    metrics::record_invocation(&endpoint.route_key(), invocation.outcome.label(), invocation.elapsed);

    invocation.result.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::{HandlerError, HandlerRegistry};
    use crate::routing::{Endpoint, RouteMethod};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    fn server(version: PayloadVersion) -> GatewayServer {
        let routes = RouteTable::new(vec![
            Endpoint::new(".", "app.echo".parse().unwrap(), "/items/{id}", RouteMethod::Get),
            Endpoint::new(".", "app.echo".parse().unwrap(), "/items", RouteMethod::Post),
            Endpoint::new(".", "app.slow".parse().unwrap(), "/slow", RouteMethod::Get),
            Endpoint::new(".", "app.fail".parse().unwrap(), "/fail", RouteMethod::Any),
        ])
        .unwrap();

        let registry = HandlerRegistry::new()
            .with("app.echo", |event: Value, _ctx| async move {
                Ok(json!({
                    "statusCode": 200,
                    "headers": {"content-type": "application/json"},
                    "body": event.to_string(),
                }))
            })
            .with("app.slow", |_event, _ctx| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(json!({"statusCode": 200}))
            })
            .with("app.fail", |_event, _ctx| async { Err(HandlerError::msg("nope")) });

        let engine = InvocationEngine::new(Arc::new(registry), ".", Some(Duration::from_millis(100)));
        let mut config = GatewayConfig::default();
        config.invocation.payload_version = version;
        config.invocation.max_body_bytes = 64;
        GatewayServer::new(routes, engine, &config)
    }

    async fn send(server: &GatewayServer, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
        let response = server.router().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_v2_event_reaches_handler() {
        let server = server(PayloadVersion::V2);
        let request = Request::get("/items/42?verbose=1").body(Body::empty()).unwrap();
        let (status, headers, body) = send(&server, request).await;

        assert_eq!(status, StatusCode::OK);
        assert!(headers.contains_key(X_REQUEST_ID));
        let event: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(event["version"], "2.0");
        assert_eq!(event["rawPath"], "/items/42");
        assert_eq!(event["routeKey"], "GET /items/42");
        assert_eq!(event["pathParameters"]["id"], "42");
        assert_eq!(event["queryStringParameters"]["verbose"], "1");
        assert_eq!(event["requestContext"]["requestId"], headers[X_REQUEST_ID].to_str().unwrap());
    }

    #[tokio::test]
    async fn test_v1_event_with_body() {
        let server = server(PayloadVersion::V1);
        let request = Request::post("/items")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"data":"POST_DATA"}"#))
            .unwrap();
        let (status, _, body) = send(&server, request).await;

        assert_eq!(status, StatusCode::OK);
        let event: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(event["version"], "1.0");
        assert_eq!(event["httpMethod"], "POST");
        assert_eq!(event["body"], r#"{"data":"POST_DATA"}"#);
        assert!(event.get("routeKey").is_none());
    }

    #[tokio::test]
    async fn test_unrouted_requests() {
        let server = server(PayloadVersion::V2);

        let (status, _, _) = send(&server, Request::get("/nothing").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, headers, _) = send(&server, Request::delete("/items").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(headers[header::ALLOW], "POST");
    }

    #[tokio::test]
    async fn test_failures_become_responses() {
        let server = server(PayloadVersion::V2);

        let (status, _, body) = send(&server, Request::get("/slow").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body, r#"{"Error":"TIMEOUT"}"#);

        let (status, _, body) = send(&server, Request::put("/fail").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#"{"Error":"HANDLER_ERROR"}"#);
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let server = server(PayloadVersion::V2);
        let request = Request::post("/items").body(Body::from(vec![b'x'; 128])).unwrap();
        let (status, _, _) = send(&server, request).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }
}

// HTTP front end for the message store

use crate::board::admin::AdminKey;
use crate::board::error::{StoreError, ValidationError};
use crate::board::message::SortOrder;
use crate::board::store::MessageStore;
use anyhow::{Context, Result};
use hyper::body::HttpBody;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW, CONTENT_LENGTH, CONTENT_TYPE,
};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use url::form_urlencoded;

pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Largest accepted `POST /msg` body. Far above any valid 140-character
/// message, even fully `\u`-escaped.
pub const MAX_BODY_BYTES: usize = 4096;

/// Methods announced to cross-origin callers
const CORS_ALLOW_METHODS: &str = "GET, POST";

const LANDING: &str = "microboard - a tiny public message board

Post:   POST /msg  {\"content\": \"...\"}  (1-140 characters)
Read:   GET /msg?limit=50&offset=0&sort=desc
        GET /msg/{id}
Stats:  GET /stats
";

/// Shared state for request handlers
pub struct HttpContext {
    pub store: Arc<MessageStore>,
    pub admin: AdminKey,
}

#[derive(Debug, Deserialize)]
struct CreateRequest {
    content: String,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    deleted: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    messages: usize,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    length: Option<usize>,
}

#[derive(Debug, Error)]
enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Unprocessable(String),

    #[error("Not found")]
    UnknownRoute,

    #[error("Method not allowed")]
    MethodNotAllowed { allow: &'static str },

    #[error("Request body exceeds {max} bytes")]
    PayloadTooLarge { max: usize },

    #[error("Failed to read request body: {0}")]
    Body(#[from] hyper::Error),

    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(StoreError::Validation(_)) | ApiError::Unprocessable(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Store(StoreError::NotFound(_)) | ApiError::UnknownRoute => {
                StatusCode::NOT_FOUND
            }
            ApiError::Store(StoreError::Forbidden) => StatusCode::FORBIDDEN,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Body(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::Persistence(_))
            | ApiError::Store(StoreError::IdsExhausted { .. })
            | ApiError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_response(self) -> Response<Body> {
        let status = self.status();
        let length = match &self {
            ApiError::Store(StoreError::Validation(ValidationError::TooLong {
                length, ..
            })) => Some(*length),
            ApiError::Store(StoreError::Validation(ValidationError::Empty)) => Some(0),
            _ => None,
        };
        let allow = match &self {
            ApiError::MethodNotAllowed { allow } => Some(*allow),
            _ => None,
        };

        let detail = if status.is_server_error() {
            // Operational details stay in the log
            tracing::error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody { detail, length };
        let mut response = match json_response(status, &body) {
            Ok(response) => response,
            Err(_) => text_response(status, body.detail),
        };
        if let Some(allow) = allow {
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static(allow));
        }
        response
    }
}

/// Bind the HTTP server without starting it.
///
/// Returns the bound address (useful with port 0) and a future that runs
/// the server until `shutdown` resolves.
pub fn bind<F>(
    addr: SocketAddr,
    ctx: Arc<HttpContext>,
    shutdown: F,
) -> Result<(SocketAddr, impl Future<Output = hyper::Result<()>> + Send)>
where
    F: Future<Output = ()> + Send + 'static,
{
    let make_svc = make_service_fn(move |_conn| {
        let ctx = ctx.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| handle_request(req, ctx.clone()))) }
    });

    let server = Server::try_bind(&addr)
        .with_context(|| format!("Failed to bind {}", addr))?
        .serve(make_svc);
    let local_addr = server.local_addr();

    Ok((local_addr, server.with_graceful_shutdown(shutdown)))
}

/// Run the HTTP server until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, ctx: Arc<HttpContext>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (local_addr, server) = bind(addr, ctx, shutdown)?;

    tracing::info!("Listening on http://{}", local_addr);

    server.await.context("HTTP server error")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn handle_request(
    req: Request<Body>,
    ctx: Arc<HttpContext>,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let result = route(req, &method, &path, &ctx).await;

    let mut response = result.unwrap_or_else(|e| {
        tracing::debug!("{} {} -> {}", method, path, e);
        e.into_response()
    });
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));

    Ok(response)
}

async fn route(
    req: Request<Body>,
    method: &Method,
    path: &str,
    ctx: &HttpContext,
) -> Result<Response<Body>, ApiError> {
    let allow = allowed_methods(path).ok_or(ApiError::UnknownRoute)?;
    if method == Method::OPTIONS {
        return Ok(preflight_response());
    }

    let query = parse_query(req.uri().query());

    match (method, path) {
        (&Method::GET, "/") => Ok(text_response(StatusCode::OK, LANDING.to_string())),
        (&Method::GET, "/health") => {
            let health = HealthResponse {
                status: "ok",
                messages: ctx.store.len().await,
            };
            json_response(StatusCode::OK, &health)
        }
        (&Method::GET, "/stats") => json_response(StatusCode::OK, &ctx.store.stats().await),
        (&Method::GET, "/msg") => handle_list(&query, ctx).await,
        (&Method::POST, "/msg") => handle_create(req, ctx).await,
        (_, p) => match (method, message_id(p)) {
            (&Method::GET, Some(id)) => json_response(StatusCode::OK, &ctx.store.get(id).await?),
            (&Method::DELETE, Some(id)) => {
                let authorized = ctx
                    .admin
                    .authorizes(query.get("admin_key").map(String::as_str));
                let deleted = ctx.store.delete(id, authorized).await?;
                json_response(StatusCode::OK, &DeleteResponse { deleted })
            }
            _ => Err(ApiError::MethodNotAllowed { allow }),
        },
    }
}

/// Value of the `Allow` header for a known path, `None` for unknown paths.
fn allowed_methods(path: &str) -> Option<&'static str> {
    match path {
        "/" | "/health" | "/stats" => Some("GET, OPTIONS"),
        "/msg" => Some("GET, POST, OPTIONS"),
        _ => message_id(path).map(|_| "GET, DELETE, OPTIONS"),
    }
}

fn message_id(path: &str) -> Option<&str> {
    path.strip_prefix("/msg/")
        .filter(|id| !id.is_empty() && !id.contains('/'))
}

async fn handle_list(
    query: &HashMap<String, String>,
    ctx: &HttpContext,
) -> Result<Response<Body>, ApiError> {
    let limit = int_param(query, "limit", DEFAULT_LIST_LIMIT)?;
    let offset = int_param(query, "offset", 0)?;
    let sort = match query.get("sort") {
        Some(s) => s.parse::<SortOrder>().map_err(StoreError::from)?,
        None => SortOrder::default(),
    };

    let messages = ctx.store.list(limit, offset, sort).await?;
    json_response(StatusCode::OK, &messages)
}

async fn handle_create(
    req: Request<Body>,
    ctx: &HttpContext,
) -> Result<Response<Body>, ApiError> {
    let body_bytes = read_body(req).await?;
    let request: CreateRequest = serde_json::from_slice(&body_bytes)
        .map_err(|e| ApiError::Unprocessable(format!("Invalid request body: {}", e)))?;

    let message = ctx.store.create(request.content).await?;
    json_response(StatusCode::OK, &message)
}

/// Collect the request body, refusing anything over `MAX_BODY_BYTES`.
///
/// A declared `Content-Length` is checked up front; the running count
/// covers chunked bodies and lying headers.
async fn read_body(req: Request<Body>) -> Result<Vec<u8>, ApiError> {
    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.map_or(false, |len| len > MAX_BODY_BYTES as u64) {
        return Err(ApiError::PayloadTooLarge { max: MAX_BODY_BYTES });
    }

    let mut body = req.into_body();
    let mut bytes = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk?;
        if bytes.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(ApiError::PayloadTooLarge { max: MAX_BODY_BYTES });
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

fn int_param(
    query: &HashMap<String, String>,
    name: &str,
    default: i64,
) -> Result<i64, ApiError> {
    match query.get(name) {
        Some(raw) => raw.parse::<i64>().map_err(|_| {
            ApiError::Unprocessable(format!("{} must be an integer, got '{}'", name, raw))
        }),
        None => Ok(default),
    }
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Body>, ApiError> {
    let body = serde_json::to_vec(value)?;
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

fn text_response(status: StatusCode, body: String) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Answer a CORS preflight. The allowed origin is added by `handle_request`.
fn preflight_response() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(CORS_ALLOW_METHODS),
    );
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    response
}

/// Decode a form-encoded query string. Later keys win.
fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    form_urlencoded::parse(query.unwrap_or("").as_bytes())
        .into_owned()
        .collect()
}

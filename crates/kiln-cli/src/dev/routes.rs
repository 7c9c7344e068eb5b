//! HTTP routes and the `/watcher` event channel.
//!
//! The artifact is read from disk on every request, so whatever the last
//! successful build left behind is what the page gets. A failed build simply
//! leaves the previous file in place.

use crate::dev::config::{SERVER_NAME, ServerConfig};
use crate::dev::environment::Environment;
use crate::dev::events::EventRouter;
use crate::dev::registry::{ConnectionRegistry, ServerMessage};
use axum::{
    BoxError, Router,
    body::{Body, Bytes, HttpBody},
    extract::{
        Request, State, WebSocketUpgrade,
        ws::{CloseFrame, Message, WebSocket, close_code},
    },
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use percent_encoding::percent_decode_str;
use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;
use tower::{Service, ServiceExt, service_fn, util::BoxCloneSyncService};
use tower_http::{
    services::{ServeDir, ServeFile},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

/// Path of the WebSocket endpoint.
pub const WATCHER_ROUTE: &str = "/watcher";
pub const PROCESS_INFO_ROUTE: &str = "/process-info.json";

/// Suffix of the directories next to the artifact that are served by name.
const RESOURCES_SUFFIX: &str = ".resources";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub registry: Arc<ConnectionRegistry>,
    pub events: EventRouter,
}

/// Build the router for `state`.
pub fn router(state: AppState) -> Router {
    let server_name = HeaderValue::from_str(&state.config.server_name().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static(SERVER_NAME));
    let entrypoint = state.config.entrypoint.route();

    Router::new()
        .route("/", get(handle_index))
        .route(&entrypoint, get(handle_entrypoint))
        .route(PROCESS_INFO_ROUTE, get(handle_process_info))
        .route(WATCHER_ROUTE, get(handle_watcher))
        .fallback_service(file_service(&state.config))
        .layer(middleware::map_response(empty_not_found))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::SERVER,
            server_name,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_index(State(state): State<AppState>) -> Response {
    let html = state.config.index.render(state.config.entrypoint);
    respond("text/html; charset=utf-8", html)
}

async fn handle_entrypoint(State(state): State<AppState>) -> Response {
    respond("application/javascript", state.config.entrypoint.content().into_owned())
}

async fn handle_process_info(State(state): State<AppState>) -> Response {
    let info = serde_json::json!({
        "env": state.config.env,
        "artifact": state.config.artifact_route(),
    });
    respond("application/json", info.to_string())
}

type FileService = BoxCloneSyncService<Request, Response, Infallible>;

/// Where a request outside the fixed routes is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileTarget {
    Artifact,
    /// `<artifact dir>/<name>.resources/...`, served at `/<name>.resources/...`
    Bundle,
    /// The configured resource roots, in order.
    Resources,
    Rejected,
}

fn classify(method: &Method, path: &str, artifact_name: &str) -> FileTarget {
    if method != Method::GET && method != Method::HEAD {
        return FileTarget::Rejected;
    }

    let decoded = percent_decode_str(path).decode_utf8_lossy();
    let relative = decoded.trim_start_matches('/');
    match relative.split_once('/') {
        None if relative == artifact_name => FileTarget::Artifact,
        Some((dir, rest)) if dir.ends_with(RESOURCES_SUFFIX) && !rest.is_empty() => {
            FileTarget::Bundle
        }
        _ => FileTarget::Resources,
    }
}

/// Artifact and resource files. Everything else is a 404.
///
/// Bundle directories fall back to the resource roots, and the roots fall
/// back to each other, so a path is served from the first place it exists.
fn file_service(config: &ServerConfig) -> FileService {
    let missing: FileService = BoxCloneSyncService::new(service_fn(|_: Request| async {
        Ok::<_, Infallible>(not_found())
    }));

    let mut roots = missing.clone();
    for root in config.resources.iter().rev() {
        roots = boxed(serve_dir(root).fallback(roots));
    }

    let artifact_dir = config.artifact.parent().unwrap_or(Path::new("."));
    let bundles = boxed(serve_dir(artifact_dir).fallback(roots.clone()));
    let artifact = boxed(ServeFile::new(&config.artifact));
    let artifact_name = config
        .artifact
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    BoxCloneSyncService::new(service_fn(move |mut request: Request| {
        // Last-Modified has one-second resolution; a rebuild inside the same
        // second must not be answered with 304.
        request.headers_mut().remove(header::IF_MODIFIED_SINCE);

        let target = match classify(request.method(), request.uri().path(), &artifact_name) {
            FileTarget::Artifact => artifact.clone(),
            FileTarget::Bundle => bundles.clone(),
            FileTarget::Resources => roots.clone(),
            FileTarget::Rejected => missing.clone(),
        };
        target.oneshot(request)
    }))
}

fn serve_dir(root: &Path) -> ServeDir {
    ServeDir::new(root).append_index_html_on_directories(false)
}

fn boxed<S, B>(service: S) -> FileService
where
    S: Service<Request, Response = axum::http::Response<B>, Error = Infallible>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    BoxCloneSyncService::new(service.map_response(|response| response.map(Body::new)))
}

/// Every 404, whichever service produced it, has the same empty shape.
async fn empty_not_found(response: Response) -> Response {
    if response.status() == StatusCode::NOT_FOUND {
        not_found()
    } else {
        response
    }
}

fn respond(content_type: &'static str, body: impl Into<Bytes>) -> Response {
    let body = body.into();
    let len = body.len() as u64;
    with_headers(StatusCode::OK, content_type, len, Body::from(body))
}

fn not_found() -> Response {
    with_headers(
        StatusCode::NOT_FOUND,
        "text/plain; charset=utf-8",
        0,
        Body::empty(),
    )
}

fn with_headers(status: StatusCode, content_type: &'static str, len: u64, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    response
}

async fn handle_watcher(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let environment = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(Environment::from_user_agent)
        .unwrap_or_default();

    ws.on_upgrade(move |socket| run_session(socket, environment, state))
}

async fn run_session(mut socket: WebSocket, environment: Environment, state: AppState) {
    let (id, mut outbound) = state.registry.register(environment);

    loop {
        tokio::select! {
            message = outbound.recv() => match message {
                Some(ServerMessage::Reload) => {
                    if socket.send(Message::Text("reload".into())).await.is_err() {
                        break;
                    }
                }
                Some(ServerMessage::Close) | None => {
                    let frame = CloseFrame {
                        code: close_code::NORMAL,
                        reason: "server shutting down".into(),
                    };
                    let _ = socket.send(Message::Close(Some(frame))).await;
                    break;
                }
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => state.events.handle_text(text.as_str(), environment),
                Some(Ok(Message::Binary(data))) => state.events.handle_binary(&data),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
            },
        }
    }

    state.registry.unregister(id);
}

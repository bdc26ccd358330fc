//! Router and server loop.

use std::collections::HashMap;
use std::future::IntoFuture;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::hooks::find_public_file;
use crate::service::Site;
use crate::storage::Storage;
use crate::store::DocumentStore;

use super::envelope::{error_status, failure, success};
use super::methods;
use super::params::Params;
use super::state::AppState;

/// Build the router over shared state.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/api/method/:method", get(call_method).post(call_method))
        .route("/files/:file_name", get(serve_file))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn log_failure(method: &str, err: &Error) {
    if error_status(err).is_server_error() {
        error!("{method} failed: {err}");
    } else {
        warn!("{method} failed: {err}");
    }
}

async fn call_method(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let method = match methods::resolve(&name) {
        Ok(method) => method,
        Err(err) => {
            log_failure(&name, &err);
            return failure(&err, None);
        }
    };
    let params = match Params::from_parts(query, &body) {
        Ok(params) => params,
        Err(err) => {
            log_failure(method.name(), &err);
            return failure(&err, method.empty_result(&Params::default()));
        }
    };

    let user = state.user_from(&headers);
    let call_params = params.clone();
    match state
        .with_desk(user, move |desk| method.call(desk, &call_params))
        .await
    {
        Ok(reply) => success(reply),
        Err(err) => {
            log_failure(method.name(), &err);
            failure(&err, method.empty_result(&params))
        }
    }
}

fn content_type(file_name: &str) -> &'static str {
    match file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "svg" => "image/svg+xml",
        Some(ext) if ext == "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

async fn serve_file(State(state): State<AppState>, Path(file_name): Path<String>) -> Response {
    let lookup = file_name.clone();
    let result = state
        .with_storage(move |storage, _| {
            let Some(file) = find_public_file(storage, &lookup)? else {
                return Ok(None);
            };
            match file.get_str("content_hash") {
                Some(hash) => storage.file_content(hash),
                None => Ok(None),
            }
        })
        .await;
    match result {
        Ok(Some(bytes)) => ([(header::CONTENT_TYPE, content_type(&file_name))], bytes).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "File not found").into_response(),
        Err(err) => {
            log_failure("files", &err);
            failure(&err, None)
        }
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                warn!("Could not register signal handlers, falling back to Ctrl-C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Serve the API until interrupted.
///
/// # Errors
///
/// Returns an error if the site policy is invalid, the address cannot be
/// bound or the server fails.
pub async fn serve(config: &Config, storage: Storage, bind: Option<&str>) -> Result<()> {
    let site = Site::from_config(config)?;
    let state = AppState::new(storage, site, &config.server.user_header)?;
    let app = router(state, config.request_timeout());

    let address = bind.unwrap_or(&config.server.bind_address);
    let listener = TcpListener::bind(address).await?;
    info!("Listening on {}", listener.local_addr()?);

    let grace = config.shutdown_timeout();
    let server = axum::serve(listener, app).with_graceful_shutdown(wait_for_shutdown_signal());
    let mut server = std::pin::pin!(server.into_future());

    tokio::select! {
        result = &mut server => result?,
        () = async {
            wait_for_shutdown_signal().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!("Shutdown grace period of {}s elapsed, exiting", grace.as_secs());
        }
    }
    info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doctype::DocType;
    use crate::document::Document;
    use crate::permission::ADMINISTRATOR;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app_with(storage: Storage) -> Router {
        let site = Site::from_config(&Config::default()).unwrap();
        let state = AppState::new(storage, site, "X-Assetlite-User").unwrap();
        router(state, Duration::from_secs(5))
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let app = app_with(Storage::open_in_memory().unwrap());
        let response = app
            .oneshot(Request::get("/api/method/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"success": true, "data": "pong"}));
    }

    #[tokio::test]
    async fn test_unknown_method_is_404() {
        let app = app_with(Storage::open_in_memory().unwrap());
        let response = app
            .oneshot(
                Request::get("/api/method/asset_lite.api.nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await,
            json!({"success": false, "error": "Unknown method: asset_lite.api.nope"})
        );
    }

    #[tokio::test]
    async fn test_guest_listing_is_denied_with_empty_result() {
        let app = app_with(Storage::open_in_memory().unwrap());
        let response = app
            .oneshot(
                Request::get("/api/method/asset_lite.api.asset_api.get_assets?limit=5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = json_body(response).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["data"], json!({"assets": [], "total_count": 0}));
        assert_eq!(body["error"], json!("Not permitted to read Asset"));
    }

    #[tokio::test]
    async fn test_post_body_creates_as_header_user() {
        let app = app_with(Storage::open_in_memory().unwrap());
        let request = Request::post("/api/method/create_work_order")
            .header("X-Assetlite-User", ADMINISTRATOR)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"work_order_data": {"company": "Corp1"}}).to_string(),
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], json!("Work Order created successfully"));
        assert_eq!(body["data"]["work_order"]["owner"], json!(ADMINISTRATOR));
    }

    #[tokio::test]
    async fn test_bad_body_is_400() {
        let app = app_with(Storage::open_in_memory().unwrap());
        let request = Request::post("/api/method/create_asset")
            .body(Body::from("not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_serves_public_qr_image() {
        let storage = Storage::open_in_memory().unwrap();
        let hash = storage.put_file_content(b"\x89PNG fake").unwrap();
        let mut file = Document::new(DocType::File);
        file.set("file_name", "A-1-qr.png");
        file.set("is_private", 0);
        file.set("content_hash", hash);
        storage.insert(file, ADMINISTRATOR).unwrap();
        let app = app_with(storage);

        let response = app
            .clone()
            .oneshot(Request::get("/files/A-1-qr.png").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"\x89PNG fake");

        let response = app
            .oneshot(Request::get("/files/missing.png").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_content_type_by_extension() {
        assert_eq!(content_type("a.PNG"), "image/png");
        assert_eq!(content_type("a.jpeg"), "image/jpeg");
        assert_eq!(content_type("noext"), "application/octet-stream");
    }
}

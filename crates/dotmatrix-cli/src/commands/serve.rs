use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::Args;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use dotmatrix_core::consts::{DEFAULT_DOT_SIZE, DEFAULT_SPACING, SERVICE_MAX_OUTPUT_FRAMES};
use dotmatrix_core::error::DotMatrixError;
use dotmatrix_core::halftone::EffectParams;
use dotmatrix_core::pipeline::{process_video, NoOpReporter, PipelineConfig};

#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub addr: SocketAddr,

    /// Output frame cap per request
    #[arg(long, default_value_t = SERVICE_MAX_OUTPUT_FRAMES)]
    pub max_frames: u64,
}

struct AppState {
    client: reqwest::Client,
    max_frames: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest {
    input_url: Option<String>,
    dot_size: Option<NumberField>,
    spacing: Option<NumberField>,
}

/// Integer request field that also arrives as `10.0` or `"10"` from
/// form-driven clients.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberField {
    Int(i64),
    Float(f64),
    Text(String),
}

impl NumberField {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            Self::Float(_) => None,
            Self::Text(t) => t.trim().parse().ok(),
        }
    }
}

fn param(field: Option<&NumberField>, name: &str, default: u32) -> Result<u32, ServiceError> {
    let Some(field) = field else {
        return Ok(default);
    };
    field
        .as_i64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| ServiceError::bad_request(format!("{name} must be a non-negative integer")))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessResponse {
    processed_video: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct ServiceError {
    status: StatusCode,
    message: String,
}

impl ServiceError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

fn status_for(err: &DotMatrixError) -> StatusCode {
    match err {
        DotMatrixError::InvalidParams(_) | DotMatrixError::Config(_) => StatusCode::BAD_REQUEST,
        DotMatrixError::Download(_) => StatusCode::BAD_GATEWAY,
        DotMatrixError::Open(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<DotMatrixError> for ServiceError {
    fn from(err: DotMatrixError) -> Self {
        Self {
            status: status_for(&err),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "Request failed");
        } else {
            info!(status = %self.status, error = %self.message, "Request rejected");
        }
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

pub fn run(args: &ServeArgs) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(serve(args))
}

async fn serve(args: &ServeArgs) -> Result<()> {
    let app = router(args.max_frames);
    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("Failed to bind {}", args.addr))?;
    info!(addr = %args.addr, "Dot-matrix service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Server error")?;
    Ok(())
}

fn router(max_frames: u64) -> Router {
    let state = Arc::new(AppState {
        client: reqwest::Client::new(),
        max_frames,
    });
    Router::new()
        .route("/api/process-video", post(process_video_handler))
        .route("/api/health", get(health))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

async fn health() -> &'static str {
    "ok"
}

async fn process_video_handler(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<ProcessRequest>, JsonRejection>,
) -> std::result::Result<Json<ProcessResponse>, ServiceError> {
    let Json(req) = body.map_err(|rejection| {
        ServiceError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    })?;
    let url = req
        .input_url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ServiceError::bad_request("inputUrl is required"))?;
    let params = EffectParams::new(
        param(req.dot_size.as_ref(), "dotSize", DEFAULT_DOT_SIZE)?,
        param(req.spacing.as_ref(), "spacing", DEFAULT_SPACING)?,
    );
    params.validate()?;
    info!(url = %url, dot_size = params.dot_size, spacing = params.spacing, "Processing request");

    let workdir = tempfile::tempdir()
        .map_err(|e| ServiceError::internal(format!("Failed to create work directory: {e}")))?;
    let input = workdir.path().join(input_file_name(&url));
    let output = workdir.path().join("output.mp4");

    let bytes = download(&state.client, &url).await?;
    tokio::fs::write(&input, &bytes)
        .await
        .map_err(|e| ServiceError::internal(format!("Failed to store download: {e}")))?;

    let mut config = PipelineConfig::new(input, output.clone());
    config.effect = params;
    config.sampling.max_output_frames = Some(state.max_frames);

    let summary = tokio::task::spawn_blocking(move || {
        process_video(&config, Arc::new(NoOpReporter))
    })
    .await
    .map_err(|e| ServiceError::internal(format!("Processing task failed: {e}")))??;

    let encoded = tokio::fs::read(&output)
        .await
        .map_err(|e| ServiceError::internal(format!("Failed to read result: {e}")))?;
    info!(
        frames = summary.frames_written,
        bytes = encoded.len(),
        "Request complete"
    );

    Ok(Json(ProcessResponse {
        processed_video: STANDARD.encode(encoded),
    }))
}

async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, DotMatrixError> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| DotMatrixError::Download(e.to_string()))?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| DotMatrixError::Download(e.to_string()))?;
    Ok(bytes.to_vec())
}

/// Keep a `.ser` extension so the SER reader is chosen; everything else goes
/// through ffmpeg, which sniffs the container itself.
fn input_file_name(url: &str) -> PathBuf {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    if path.to_ascii_lowercase().ends_with(".ser") {
        PathBuf::from("input.ser")
    } else {
        PathBuf::from("input.video")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&DotMatrixError::InvalidParams("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&DotMatrixError::Download("x".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&DotMatrixError::Open("x".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&DotMatrixError::Encode("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    fn field(json: &str) -> NumberField {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_numeric_params_accept_strings() {
        assert_eq!(param(Some(&field("12")), "dotSize", 10).ok(), Some(12));
        assert_eq!(param(Some(&field("\"12\"")), "dotSize", 10).ok(), Some(12));
        assert_eq!(param(Some(&field("8.0")), "dotSize", 10).ok(), Some(8));
        assert_eq!(param(None, "dotSize", 10).ok(), Some(10));
        assert!(param(Some(&field("-1")), "dotSize", 10).is_err());
        assert!(param(Some(&field("2.5")), "dotSize", 10).is_err());
        assert!(param(Some(&field("\"ten\"")), "dotSize", 10).is_err());
    }

    #[test]
    fn test_input_file_name() {
        assert_eq!(
            input_file_name("https://host/a/clip.SER?token=1"),
            PathBuf::from("input.ser")
        );
        assert_eq!(
            input_file_name("https://host/a/clip.mp4"),
            PathBuf::from("input.video")
        );
    }

    async fn spawn_service() -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(SERVICE_MAX_OUTPUT_FRAMES))
                .await
                .unwrap();
        });
        addr
    }

    async fn post(addr: SocketAddr, content_type: &str, body: String) -> (u16, serde_json::Value) {
        let response = reqwest::Client::new()
            .post(format!("http://{addr}/api/process-video"))
            .header("content-type", content_type)
            .body(body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        let body = response.json().await.unwrap();
        (status, body)
    }

    fn error_text(body: &serde_json::Value) -> &str {
        body["error"].as_str().unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let addr = spawn_service().await;
        let text = reqwest::get(format!("http://{addr}/api/health"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn test_wrong_content_type_is_json_error() {
        let addr = spawn_service().await;
        let (status, body) = post(addr, "text/plain", "inputUrl=x".into()).await;
        assert_eq!(status, 400);
        assert!(error_text(&body).starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_error() {
        let addr = spawn_service().await;
        let (status, body) = post(addr, "application/json", "{\"inputUrl\": ".into()).await;
        assert_eq!(status, 400);
        assert!(body.get("error").is_some());

        let (status, body) = post(
            addr,
            "application/json",
            r#"{"inputUrl": "http://host/a.mp4", "dotSize": true}"#.into(),
        )
        .await;
        assert_eq!(status, 400);
        assert!(body.get("error").is_some());
    }

    #[tokio::test]
    async fn test_missing_url_rejected() {
        let addr = spawn_service().await;
        let (status, body) = post(addr, "application/json", r#"{"dotSize": 4}"#.into()).await;
        assert_eq!(status, 400);
        assert_eq!(error_text(&body), "inputUrl is required");
    }

    #[tokio::test]
    async fn test_bad_params_rejected() {
        let addr = spawn_service().await;
        let (status, body) = post(
            addr,
            "application/json",
            r#"{"inputUrl": "http://host/a.mp4", "dotSize": -1}"#.into(),
        )
        .await;
        assert_eq!(status, 400);
        assert!(error_text(&body).contains("dotSize"));

        let (status, _) = post(
            addr,
            "application/json",
            r#"{"inputUrl": "http://host/a.mp4", "dotSize": "0"}"#.into(),
        )
        .await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn test_download_failure_is_bad_gateway() {
        let addr = spawn_service().await;
        // String params pass validation; the URL 404s against this server.
        let (status, body) = post(
            addr,
            "application/json",
            format!(r#"{{"inputUrl": "http://{addr}/missing.mp4", "dotSize": "12", "spacing": "1"}}"#),
        )
        .await;
        assert_eq!(status, 502);
        assert!(body.get("error").is_some());
    }
}

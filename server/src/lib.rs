pub mod config;
pub mod error;
pub mod metrics;
pub mod validation;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, OnceLock,
};
use std::time::Instant;

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use speech_core::{available_devices, DeviceInfo, SpeechGenerator, SpeechResult};
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::metrics::{
    AppMetrics, DetailedMetricsResponse, EndpointMetricsResponse, SpeechMetricsResponse,
    SystemMetrics,
};
use crate::validation::{parse_device, validate_tts_text, voice_or_default};

#[derive(Clone)]
pub struct AppState {
    pub speech: Arc<SpeechGenerator>,
    pub metrics: AppMetrics,
    pub request_count: Arc<AtomicU64>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(speech: SpeechGenerator, config: ServerConfig) -> Self {
        Self {
            speech: Arc::new(speech),
            metrics: AppMetrics::new(),
            request_count: Arc::new(AtomicU64::new(0)),
            config,
        }
    }
}

#[derive(Deserialize)]
pub struct TtsRequest {
    text: Option<String>,
    voice: Option<String>,
    device: Option<String>,
}

#[derive(Serialize)]
pub struct TtsResponse {
    success: bool,
    audio_file: String,
    text: String,
    voice: &'static str,
    voice_name: &'static str,
    emoji: &'static str,
    language: &'static str,
    device: &'static str,
    duration_ms: u64,
}

#[derive(Serialize)]
pub struct VoiceInfo {
    id: &'static str,
    name: &'static str,
    emoji: &'static str,
    language: &'static str,
}

#[derive(Serialize)]
pub struct VoiceGroup {
    language: &'static str,
    voices: Vec<VoiceInfo>,
}

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Routes without the outer middleware stack.
pub fn router(state: AppState) -> Router {
    let _ = START_TIME.get_or_init(Instant::now);

    let api = Router::new()
        .route("/voices", get(list_voices))
        .route("/devices", get(list_devices))
        .route("/tts", post(tts_endpoint))
        .route("/metrics", get(metrics_endpoint));

    let frontend = ServeDir::new(&state.config.frontend_dir);

    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/audio/{filename}", get(serve_audio))
        .nest("/api", api)
        .fallback_service(frontend)
        .with_state(state)
}

/// Full application: routes plus tracing, rate limiting, timeout, CORS and
/// request ids.
pub fn app(state: AppState) -> anyhow::Result<Router> {
    let config = state.config.clone();

    let cors = match config.cors_allowed_origins {
        Some(ref allowed_origins) => {
            let origins: Vec<HeaderValue> = allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect();
            if origins.is_empty() {
                warn!("CORS_ALLOWED_ORIGINS is empty, falling back to permissive CORS");
                CorsLayer::new().allow_origin(Any)
            } else {
                info!("CORS configured for {} origin(s)", origins.len());
                CorsLayer::new().allow_origin(AllowOrigin::list(origins))
            }
        }
        None => {
            warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
            CorsLayer::new().allow_origin(Any)
        }
    }
    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
    .allow_headers(Any)
    .allow_credentials(false);

    // One global bucket: all clients share the configured per-minute quota
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond((60_000 / config.rate_limit_per_minute.max(1)).max(1) as u64)
            .burst_size(config.rate_limit_per_minute.max(1))
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?,
    );
    info!("Rate limiting: {} requests per minute", config.rate_limit_per_minute);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(cors)
        .into_inner();

    Ok(router(state)
        .layer(axum::middleware::from_fn(add_request_id))
        .layer(middleware_stack))
}

// Request ID middleware for tracing
async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let header_value = HeaderValue::from_str(&request_id).ok();
    if let Some(ref value) = header_value {
        request.headers_mut().insert("x-request-id", value.clone());
    }
    let mut response = next.run(request).await;
    if let Some(value) = header_value {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn list_voices(State(state): State<AppState>) -> Json<Vec<VoiceGroup>> {
    let groups = state
        .speech
        .registry()
        .list_grouped_by_language()
        .into_iter()
        .map(|group| VoiceGroup {
            language: group.language,
            voices: group
                .voices
                .into_iter()
                .map(|v| VoiceInfo {
                    id: v.voice_id,
                    name: v.display_name,
                    emoji: v.emoji,
                    language: v.language_label,
                })
                .collect(),
        })
        .collect();
    Json(groups)
}

pub async fn list_devices(State(state): State<AppState>) -> Json<Vec<DeviceInfo>> {
    Json(available_devices(state.speech.probe()))
}

pub async fn tts_endpoint(
    State(state): State<AppState>,
    Json(req): Json<TtsRequest>,
) -> Result<Json<TtsResponse>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let start_time = Instant::now();

    let outcome = generate_for_request(&state, req).await;

    let elapsed_ms = start_time.elapsed().as_millis() as u64;
    state.metrics.tts.record_request(elapsed_ms);
    let result = outcome.inspect_err(|_| state.metrics.tts.record_error())?;
    state.metrics.speech.record_generation(elapsed_ms, &result);
    info!("Generated audio file: {}", result.file_path.display());

    Ok(Json(TtsResponse {
        success: true,
        audio_file: format!("/audio/{}", result.file_name),
        text: result.original_text,
        voice: result.voice_id,
        voice_name: result.display_name,
        emoji: result.emoji,
        language: result.language_label,
        device: result.resolved_device.id(),
        duration_ms: result.duration_ms,
    }))
}

async fn generate_for_request(state: &AppState, req: TtsRequest) -> Result<SpeechResult, ApiError> {
    let text = validate_tts_text(req.text.as_deref())?.to_string();
    let voice = voice_or_default(req.voice.as_deref()).to_string();
    let device = parse_device(req.device.as_deref())?;

    // Synthesis blocks for seconds; keep it off the async workers. A client
    // disconnect drops this future but the blocking task runs to completion.
    let speech = Arc::clone(&state.speech);
    let result = tokio::task::spawn_blocking(move || speech.generate(&text, &voice, device))
        .await
        .map_err(|e| ApiError::InternalError(format!("Task join error: {e}")))??;
    Ok(result)
}

pub async fn serve_audio(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let path = state
        .speech
        .store()
        .path_for(&filename)
        .ok_or_else(|| ApiError::NotFound(filename.clone()))?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(filename));
        }
        Err(e) => return Err(ApiError::InternalError(format!("Failed to read {filename}: {e}"))),
    };

    Ok(([(header::CONTENT_TYPE, "audio/wav")], bytes).into_response())
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<DetailedMetricsResponse> {
    let mut system = sysinfo::System::new();
    system.refresh_cpu();
    system.refresh_memory();

    let memory_used = system.used_memory();
    let memory_total = system.total_memory();
    let memory_usage_percent = if memory_total > 0 {
        (memory_used as f64 / memory_total as f64 * 100.0) as f32
    } else {
        0.0
    };

    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);

    let system_load = if cfg!(unix) {
        Some(sysinfo::System::load_average().one)
    } else {
        None
    };

    Json(DetailedMetricsResponse {
        timestamp: chrono::Utc::now(),
        system: SystemMetrics {
            cpu_usage_percent: system.global_cpu_info().cpu_usage(),
            memory_used_mb: memory_used / 1024 / 1024,
            memory_total_mb: memory_total / 1024 / 1024,
            memory_usage_percent,
            request_count: state.request_count.load(Ordering::Relaxed),
            uptime_seconds: uptime,
            system_load,
        },
        endpoints: EndpointMetricsResponse {
            tts: state.metrics.tts.stats(),
        },
        speech: SpeechMetricsResponse::from_metrics(
            &state.metrics.speech,
            state.speech.cache().len(),
        ),
    })
}

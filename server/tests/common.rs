//! Common utilities for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use speech_core::{
    AudioSegment, AudioStore, FixedProbe, PipelineFactory, PipelineKey, SpeechGenerator,
    SpeechPipeline, SynthesisStep, SynthesisSteps, VoiceRegistry,
};
use speech_server::{config::ServerConfig, router, AppState};
use tempfile::TempDir;
use tower::ServiceExt;

/// Replays the same segments for every text, one step per segment.
pub struct StubPipeline {
    segments: Vec<Vec<f32>>,
}

impl SpeechPipeline for StubPipeline {
    fn synthesize<'a>(&'a self, text: &str, _voice_id: &str) -> anyhow::Result<SynthesisSteps<'a>> {
        let text = text.to_string();
        Ok(Box::new(self.segments.iter().map(move |s| {
            Ok(SynthesisStep {
                graphemes: text.clone(),
                phonemes: String::new(),
                audio: AudioSegment(s.clone()),
            })
        })))
    }
}

pub struct StubFactory {
    segments: Vec<Vec<f32>>,
    pub created: AtomicUsize,
}

impl StubFactory {
    pub fn new(segments: Vec<Vec<f32>>) -> Arc<Self> {
        Arc::new(Self {
            segments,
            created: AtomicUsize::new(0),
        })
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl PipelineFactory for StubFactory {
    fn create(&self, _key: &PipelineKey) -> anyhow::Result<Arc<dyn SpeechPipeline>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let pipeline: Arc<dyn SpeechPipeline> = Arc::new(StubPipeline {
            segments: self.segments.clone(),
        });
        Ok(pipeline)
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub factory: Arc<StubFactory>,
    pub audio_dir: TempDir,
    pub frontend_dir: TempDir,
}

/// Create a test app instance backed by a stub synthesis backend
pub fn create_test_app_with(segments: Vec<Vec<f32>>, gpu: bool) -> TestApp {
    let audio_dir = tempfile::tempdir().expect("audio dir");
    let frontend_dir = tempfile::tempdir().expect("frontend dir");
    std::fs::write(
        frontend_dir.path().join("index.html"),
        "<!doctype html><title>Voice Studio</title>",
    )
    .expect("index.html");

    let factory = StubFactory::new(segments);
    let speech = SpeechGenerator::new(
        VoiceRegistry::builtin(),
        factory.clone(),
        Arc::new(FixedProbe(gpu)),
        AudioStore::open(audio_dir.path()).expect("audio store"),
    );
    let config = ServerConfig {
        audio_dir: audio_dir.path().to_path_buf(),
        frontend_dir: frontend_dir.path().to_path_buf(),
        ..ServerConfig::default()
    };

    let state = AppState::new(speech, config);
    TestApp {
        router: router(state.clone()),
        state,
        factory,
        audio_dir,
        frontend_dir,
    }
}

/// Two short segments on a CPU-only host
pub fn create_test_app() -> TestApp {
    create_test_app_with(vec![vec![0.1, 0.2, 0.3], vec![-0.1, -0.2]], false)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
}

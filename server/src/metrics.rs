// Metrics collection and tracking

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::Serialize;
use speech_core::SpeechResult;

/// Latency samples kept for percentile calculation
const MAX_LATENCY_SAMPLES: usize = 1000;

/// Per-endpoint metrics
#[derive(Debug, Clone)]
pub struct EndpointMetrics {
    pub request_count: Arc<AtomicU64>,
    pub error_count: Arc<AtomicU64>,
    pub total_latency_ms: Arc<AtomicU64>,
    pub min_latency_ms: Arc<AtomicU64>,
    pub max_latency_ms: Arc<AtomicU64>,
    pub latency_samples: Arc<std::sync::Mutex<Vec<u64>>>,
}

impl EndpointMetrics {
    pub fn new() -> Self {
        Self {
            request_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
            total_latency_ms: Arc::new(AtomicU64::new(0)),
            min_latency_ms: Arc::new(AtomicU64::new(u64::MAX)),
            max_latency_ms: Arc::new(AtomicU64::new(0)),
            latency_samples: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn record_request(&self, latency_ms: u64) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.min_latency_ms.fetch_min(latency_ms, Ordering::Relaxed);
        self.max_latency_ms.fetch_max(latency_ms, Ordering::Relaxed);

        if let Ok(mut samples) = self.latency_samples.lock() {
            samples.push(latency_ms);
            if samples.len() > MAX_LATENCY_SAMPLES {
                samples.remove(0);
            }
        }
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_latency_ms(&self) -> f64 {
        let count = self.request_count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        total as f64 / count as f64
    }

    fn percentile(&self, p: u8) -> u64 {
        if let Ok(samples) = self.latency_samples.lock() {
            if samples.is_empty() {
                return 0;
            }
            let mut sorted = samples.clone();
            sorted.sort_unstable();
            let index = (sorted.len() * p as usize / 100).min(sorted.len() - 1);
            sorted[index]
        } else {
            0
        }
    }

    pub fn stats(&self) -> EndpointStats {
        let min = self.min_latency_ms.load(Ordering::Relaxed);
        EndpointStats {
            request_count: self.request_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            avg_latency_ms: self.avg_latency_ms(),
            min_latency_ms: if min == u64::MAX { 0 } else { min },
            max_latency_ms: self.max_latency_ms.load(Ordering::Relaxed),
            p50_latency_ms: self.percentile(50),
            p95_latency_ms: self.percentile(95),
            p99_latency_ms: self.percentile(99),
        }
    }
}

impl Default for EndpointMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Speech generation counters
#[derive(Debug, Clone, Default)]
pub struct SpeechMetrics {
    pub generated_files: Arc<AtomicU64>,
    pub total_generation_time_ms: Arc<AtomicU64>,
    pub total_samples: Arc<AtomicU64>,
    pub device_fallbacks: Arc<AtomicU64>,
    pub voice_fallbacks: Arc<AtomicU64>,
}

impl SpeechMetrics {
    pub fn record_generation(&self, time_ms: u64, result: &SpeechResult) {
        self.generated_files.fetch_add(1, Ordering::Relaxed);
        self.total_generation_time_ms.fetch_add(time_ms, Ordering::Relaxed);
        self.total_samples
            .fetch_add(result.sample_count as u64, Ordering::Relaxed);
        if result.device_fallback {
            self.device_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
        if result.voice_fallback {
            self.voice_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn avg_generation_time_ms(&self) -> f64 {
        let count = self.generated_files.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.total_generation_time_ms.load(Ordering::Relaxed) as f64 / count as f64
    }
}

/// Comprehensive metrics structure
#[derive(Debug, Clone, Default)]
pub struct AppMetrics {
    pub tts: EndpointMetrics,
    pub speech: SpeechMetrics,
}

impl AppMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Serialize)]
pub struct DetailedMetricsResponse {
    pub timestamp: DateTime<Utc>,
    pub system: SystemMetrics,
    pub endpoints: EndpointMetricsResponse,
    pub speech: SpeechMetricsResponse,
}

#[derive(Serialize)]
pub struct SystemMetrics {
    pub cpu_usage_percent: f32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub memory_usage_percent: f32,
    pub request_count: u64,
    pub uptime_seconds: u64,
    pub system_load: Option<f64>,
}

#[derive(Serialize)]
pub struct EndpointMetricsResponse {
    pub tts: EndpointStats,
}

#[derive(Debug, Serialize)]
pub struct EndpointStats {
    pub request_count: u64,
    pub error_count: u64,
    pub avg_latency_ms: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
    pub p99_latency_ms: u64,
}

#[derive(Serialize)]
pub struct SpeechMetricsResponse {
    pub generated_files: u64,
    pub avg_generation_time_ms: f64,
    pub total_samples: u64,
    pub device_fallbacks: u64,
    pub voice_fallbacks: u64,
    pub pipelines_loaded: usize,
}

impl SpeechMetricsResponse {
    pub fn from_metrics(metrics: &SpeechMetrics, pipelines_loaded: usize) -> Self {
        Self {
            generated_files: metrics.generated_files.load(Ordering::Relaxed),
            avg_generation_time_ms: metrics.avg_generation_time_ms(),
            total_samples: metrics.total_samples.load(Ordering::Relaxed),
            device_fallbacks: metrics.device_fallbacks.load(Ordering::Relaxed),
            voice_fallbacks: metrics.voice_fallbacks.load(Ordering::Relaxed),
            pipelines_loaded,
        }
    }
}

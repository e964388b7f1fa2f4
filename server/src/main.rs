use std::{net::SocketAddr, sync::Arc};

use speech_core::{AudioStore, PiperFactory, SpeechGenerator, SystemProbe, VoiceRegistry};
use tokio::net::TcpListener;
use tracing::{info, warn};

use speech_server::{app, config::ServerConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting TTS server...");

    let config = ServerConfig::from_env();

    let factory = PiperFactory::from_mapfile(&config.model_map).unwrap_or_else(|e| {
        warn!("Could not load {}: {e}, no voices can be synthesized.", config.model_map.display());
        PiperFactory::default()
    });
    info!("Piper models configured for language codes: {:?}", factory.language_codes());

    let store = AudioStore::open(&config.audio_dir).map_err(|e| {
        anyhow::anyhow!("Failed to create audio directory {}: {e}", config.audio_dir.display())
    })?;
    info!("Initialized TTS service with output directory: {}", store.dir().display());

    let probe = SystemProbe;
    info!("CUDA available: {}", speech_core::DeviceProbe::gpu_available(&probe));
    if !config.frontend_dir.is_dir() {
        warn!("Frontend directory {} does not exist", config.frontend_dir.display());
    }

    let speech = SpeechGenerator::new(
        VoiceRegistry::builtin(),
        Arc::new(factory),
        Arc::new(probe),
        store,
    );

    info!(
        "Server configuration loaded: port={}, rate_limit={}/min, request_timeout={}s",
        config.port, config.rate_limit_per_minute, config.request_timeout_secs
    );
    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let app = app(AppState::new(speech, config))?;

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

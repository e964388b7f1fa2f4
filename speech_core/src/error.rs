use std::path::PathBuf;

use thiserror::Error;

/// Failures of a single speech generation request.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("No audio was generated")]
    NoAudioProduced,

    #[error("Failed to write audio file {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("Failed to create pipeline: {0}")]
    PipelineInit(#[source] anyhow::Error),

    #[error("Synthesis failed: {0}")]
    Synthesis(#[source] anyhow::Error),
}

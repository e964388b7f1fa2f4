//! Text-to-speech orchestration: voice lookup, device fallback, a pipeline
//! cache keyed by (language, device), and WAV persistence of generated audio.
//!
//! Synthesis itself is delegated to a [`PipelineFactory`]; [`PiperFactory`]
//! is the production backend.

mod device;
mod error;
mod generator;
mod piper;
mod pipeline;
mod store;
mod voices;
pub mod wav;

pub use device::{
    available_devices, resolve_device, Device, DeviceInfo, DeviceProbe, DeviceResolution,
    FixedProbe, SystemProbe, UnknownDevice,
};
pub use error::SpeechError;
pub use generator::{concat_segments, SpeechGenerator, SpeechResult};
pub use piper::{resample, PiperFactory};
pub use pipeline::{
    AudioSegment, PipelineCache, PipelineFactory, PipelineKey, SpeechPipeline, SynthesisStep,
    SynthesisSteps,
};
pub use store::AudioStore;
pub use voices::{
    LanguageGroup, VoiceDescriptor, VoiceRegistry, VoiceResolution, DEFAULT_VOICE_ID,
};

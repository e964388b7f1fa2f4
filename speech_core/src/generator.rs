//! Text to WAV file orchestration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::device::{resolve_device, Device, DeviceProbe};
use crate::error::SpeechError;
use crate::pipeline::{AudioSegment, PipelineCache, PipelineFactory};
use crate::store::AudioStore;
use crate::voices::VoiceRegistry;
use crate::wav::SAMPLE_RATE;

/// A generated, persisted utterance.
#[derive(Debug, Clone, Serialize)]
pub struct SpeechResult {
    pub file_path: PathBuf,
    pub file_name: String,
    pub original_text: String,
    pub voice_id: &'static str,
    pub emoji: &'static str,
    pub display_name: &'static str,
    pub language_label: &'static str,
    pub resolved_device: Device,
    pub device_fallback: bool,
    pub voice_fallback: bool,
    pub sample_count: usize,
    pub duration_ms: u64,
}

pub struct SpeechGenerator {
    registry: VoiceRegistry,
    cache: PipelineCache,
    probe: Arc<dyn DeviceProbe>,
    store: AudioStore,
}

impl SpeechGenerator {
    pub fn new(
        registry: VoiceRegistry,
        factory: Arc<dyn PipelineFactory>,
        probe: Arc<dyn DeviceProbe>,
        store: AudioStore,
    ) -> Self {
        Self {
            registry,
            cache: PipelineCache::new(factory),
            probe,
            store,
        }
    }

    pub fn registry(&self) -> &VoiceRegistry {
        &self.registry
    }

    pub fn probe(&self) -> &dyn DeviceProbe {
        self.probe.as_ref()
    }

    pub fn store(&self) -> &AudioStore {
        &self.store
    }

    pub fn cache(&self) -> &PipelineCache {
        &self.cache
    }

    /// Synthesize `text` with the given voice and write it to a new WAV file.
    ///
    /// Unknown voices and unavailable GPUs are substituted silently; the
    /// substitutions are reported through the fallback flags of the result.
    /// Blocks for the whole synthesis; call from a blocking context.
    pub fn generate(
        &self,
        text: &str,
        voice_id: &str,
        requested_device: Device,
    ) -> Result<SpeechResult, SpeechError> {
        let preview: String = text.chars().take(50).collect();
        info!(
            "Generating speech for text: {}... with voice: {} on device: {}",
            preview, voice_id, requested_device
        );
        let started = Instant::now();

        let device = resolve_device(requested_device, self.probe.as_ref());
        let voice = self.registry.resolve(voice_id);
        let pipeline = self
            .cache
            .get_pipeline(voice.voice.language_code, device.device)?;

        let timestamp = chrono::Utc::now().timestamp_millis();

        let steps = pipeline
            .synthesize(text, voice.voice.voice_id)
            .map_err(SpeechError::Synthesis)?;
        let mut segments: Vec<AudioSegment> = Vec::new();
        for (i, step) in steps.enumerate() {
            let step = step.map_err(SpeechError::Synthesis)?;
            let graphemes: String = step.graphemes.chars().take(30).collect();
            debug!("Generated segment {}: {}...", i, graphemes);
            segments.push(step.audio);
        }

        let samples = concat_segments(segments).ok_or_else(|| {
            error!("No audio segments were generated");
            SpeechError::NoAudioProduced
        })?;

        let file_name = AudioStore::file_name_for(voice.voice.voice_id, device.device, timestamp);
        let file_path = self.store.write(&file_name, &samples).map_err(|e| {
            error!("Error writing audio file: {e}");
            e
        })?;
        info!(
            "Successfully generated new audio file: {} in {:.2}s",
            file_path.display(),
            started.elapsed().as_secs_f64()
        );

        let duration_ms = samples.len() as u64 * 1000 / SAMPLE_RATE as u64;
        Ok(SpeechResult {
            file_path,
            file_name,
            original_text: text.to_string(),
            voice_id: voice.voice.voice_id,
            emoji: voice.voice.emoji,
            display_name: voice.voice.display_name,
            language_label: voice.voice.language_label,
            resolved_device: device.device,
            device_fallback: device.fallback,
            voice_fallback: voice.fallback,
            sample_count: samples.len(),
            duration_ms,
        })
    }
}

/// Join segments in production order. `None` when there are no segments;
/// a single segment is returned without copying.
pub fn concat_segments(segments: Vec<AudioSegment>) -> Option<Vec<f32>> {
    let mut iter = segments.into_iter();
    let first = iter.next()?.into_vec();
    let rest: Vec<AudioSegment> = iter.collect();
    if rest.is_empty() {
        return Some(first);
    }

    let total = first.len() + rest.iter().map(AudioSegment::len).sum::<usize>();
    let mut samples = Vec::with_capacity(total);
    samples.extend(first);
    for segment in rest {
        samples.extend(segment.into_vec());
    }
    Some(samples)
}

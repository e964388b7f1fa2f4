//! Piper ONNX voices as the production synthesis backend.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use anyhow::Context;
use piper_rs::synth::{PiperSpeechStreamParallel, PiperSpeechSynthesizer};
use rubato::{
    calculate_cutoff, Resampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::pipeline::{
    AudioSegment, PipelineFactory, PipelineKey, SpeechPipeline, SynthesisStep, SynthesisSteps,
};
use crate::wav::SAMPLE_RATE;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum MapEntry {
    Path(String),
    Detailed { config: String },
}

impl MapEntry {
    fn config(&self) -> &str {
        match self {
            MapEntry::Path(p) => p,
            MapEntry::Detailed { config } => config,
        }
    }
}

/// Builds Piper pipelines from a language code -> model config mapping.
#[derive(Debug, Clone, Default)]
pub struct PiperFactory {
    configs: HashMap<String, PathBuf>,
}

impl PiperFactory {
    pub fn new(configs: HashMap<String, PathBuf>) -> Self {
        Self { configs }
    }

    /// Load the mapping from a JSON object such as
    /// `{"a": "models/en_US/en_US-lessac-medium.onnx.json", "h": {"config": "..."}}`.
    pub fn from_mapfile<P: AsRef<Path>>(p: P) -> anyhow::Result<Self> {
        let p = p.as_ref();
        let text = fs::read_to_string(p).with_context(|| format!("Failed to load {}", p.display()))?;
        let entries: HashMap<String, MapEntry> = serde_json::from_str(&text)
            .with_context(|| format!("{} must be a JSON object of language code -> config", p.display()))?;

        let configs = entries
            .into_iter()
            .map(|(lang, entry)| (lang, PathBuf::from(entry.config())))
            .collect();
        Ok(Self { configs })
    }

    pub fn language_codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.configs.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }

    /// Read sample rate from model config JSON
    fn read_sample_rate(cfg_path: &Path) -> anyhow::Result<u32> {
        let text = fs::read_to_string(cfg_path)
            .with_context(|| format!("Failed to read config file: {}", cfg_path.display()))?;
        let json: serde_json::Value =
            serde_json::from_str(&text).with_context(|| "Config file is not valid JSON")?;

        let sample_rate = json
            .get("audio")
            .and_then(|a| a.get("sample_rate"))
            .and_then(|sr| sr.as_u64())
            .ok_or_else(|| anyhow::anyhow!("Missing or invalid 'audio.sample_rate' in config"))?;

        Ok(sample_rate as u32)
    }
}

impl PipelineFactory for PiperFactory {
    fn create(&self, key: &PipelineKey) -> anyhow::Result<Arc<dyn SpeechPipeline>> {
        let cfg_path = self.configs.get(&key.language_code).ok_or_else(|| {
            anyhow::anyhow!(
                "No Piper model configured for language code '{}'",
                key.language_code
            )
        })?;

        if key.device == Device::Gpu {
            warn!("Piper sessions use the ONNX runtime's default execution providers");
        }

        let sample_rate = Self::read_sample_rate(cfg_path)?;
        let model = piper_rs::from_config_path(cfg_path)
            .map_err(|e| anyhow::anyhow!("piper load error: {e}"))?;
        let synth = PiperSpeechSynthesizer::new(model)?;
        info!(
            "Loaded Piper model {} ({} Hz)",
            cfg_path.display(),
            sample_rate
        );

        let pipeline: Arc<dyn SpeechPipeline> = Arc::new(PiperPipeline {
            synth: RwLock::new(synth),
            sample_rate,
        });
        Ok(pipeline)
    }
}

struct PiperPipeline {
    synth: RwLock<PiperSpeechSynthesizer>,
    sample_rate: u32,
}

impl SpeechPipeline for PiperPipeline {
    fn synthesize<'a>(&'a self, text: &str, voice_id: &str) -> anyhow::Result<SynthesisSteps<'a>> {
        debug!("Piper models are single-voice; '{}' only selects the language", voice_id);
        let iter: PiperSpeechStreamParallel = {
            let synth = self.synth.read().map_err(|_| {
                anyhow::anyhow!("Synthesizer lock poisoned - this indicates a previous panic")
            })?;
            synth
                .synthesize_parallel(text.to_string(), None)
                .map_err(|e| anyhow::anyhow!("piper synth error: {e}"))?
        };

        let from_rate = self.sample_rate;
        Ok(Box::new(iter.map(move |part| {
            let samples = part
                .map_err(|e| anyhow::anyhow!("chunk error: {e}"))?
                .into_vec();
            Ok(SynthesisStep {
                audio: AudioSegment::from(resample(&samples, from_rate, SAMPLE_RATE)?),
                ..Default::default()
            })
        })))
    }
}

/// Sinc resampling of a mono segment to `to_sr`.
///
/// The whole segment is one resampler chunk. The filter delay is flushed
/// and trimmed so the output is aligned with the input and holds exactly
/// `round(len * to_sr / from_sr)` samples.
pub fn resample(samples: &[f32], from_sr: u32, to_sr: u32) -> anyhow::Result<Vec<f32>> {
    if from_sr == to_sr || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let sinc_len = 256;
    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        to_sr as f64 / from_sr as f64,
        2.0,
        params,
        samples.len(),
        1, // mono
    )
    .context("Failed to create resampler")?;

    let expected = (samples.len() as f64 * to_sr as f64 / from_sr as f64).round() as usize;
    let delay = resampler.output_delay();

    let mut output = resampler
        .process(&[samples], None)
        .context("Resampling failed")?
        .into_iter()
        .next()
        .unwrap_or_default();
    while output.len() < delay + expected {
        let tail = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .context("Resampling flush failed")?
            .into_iter()
            .next()
            .unwrap_or_default();
        if tail.is_empty() {
            break;
        }
        output.extend(tail);
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected);
    Ok(output)
}

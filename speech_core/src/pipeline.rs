//! Synthesis pipeline capability and the per-(language, device) cache.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, PoisonError,
};

use dashmap::DashMap;
use tracing::info;

use crate::device::Device;
use crate::error::SpeechError;

/// Mono PCM samples produced by one synthesis step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioSegment(pub Vec<f32>);

impl AudioSegment {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }
}

impl From<Vec<f32>> for AudioSegment {
    fn from(samples: Vec<f32>) -> Self {
        Self(samples)
    }
}

impl From<Vec<f64>> for AudioSegment {
    fn from(samples: Vec<f64>) -> Self {
        Self(samples.into_iter().map(|s| s as f32).collect())
    }
}

/// One step of a synthesis run: the text chunk, its phonemes, and its audio.
/// Backends that do not expose the text or phonemes leave them empty.
#[derive(Debug, Clone, Default)]
pub struct SynthesisStep {
    pub graphemes: String,
    pub phonemes: String,
    pub audio: AudioSegment,
}

pub type SynthesisSteps<'a> = Box<dyn Iterator<Item = anyhow::Result<SynthesisStep>> + 'a>;

/// A loaded synthesis model bound to one language and device.
pub trait SpeechPipeline: Send + Sync {
    /// Feed `text` as a single unit and return the lazily produced steps.
    fn synthesize<'a>(&'a self, text: &str, voice_id: &str) -> anyhow::Result<SynthesisSteps<'a>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub language_code: String,
    pub device: Device,
}

impl PipelineKey {
    pub fn new(language_code: impl Into<String>, device: Device) -> Self {
        Self {
            language_code: language_code.into(),
            device,
        }
    }
}

/// Builds pipelines. Construction is expensive (model loading).
pub trait PipelineFactory: Send + Sync {
    fn create(&self, key: &PipelineKey) -> anyhow::Result<Arc<dyn SpeechPipeline>>;
}

type Slot = Arc<Mutex<Option<Arc<dyn SpeechPipeline>>>>;

/// Memoizes one pipeline per key for the lifetime of the cache.
///
/// Every key owns a slot guarded by its own mutex, so concurrent requests
/// for the same missing key construct it once while other keys proceed.
/// A failed or panicking construction leaves the slot empty and the next
/// caller retries.
pub struct PipelineCache {
    factory: Arc<dyn PipelineFactory>,
    slots: DashMap<PipelineKey, Slot>,
    built: AtomicUsize,
}

impl PipelineCache {
    pub fn new(factory: Arc<dyn PipelineFactory>) -> Self {
        Self {
            factory,
            slots: DashMap::new(),
            built: AtomicUsize::new(0),
        }
    }

    pub fn get_pipeline(
        &self,
        language_code: &str,
        device: Device,
    ) -> Result<Arc<dyn SpeechPipeline>, SpeechError> {
        self.get_or_create(&PipelineKey::new(language_code, device))
    }

    pub fn get_or_create(&self, key: &PipelineKey) -> Result<Arc<dyn SpeechPipeline>, SpeechError> {
        // Clone the slot out so the map shard lock is released before the
        // (possibly slow) construction below.
        let slot = self.slots.entry(key.clone()).or_default().clone();

        // A panic inside `create` poisons the lock but never fills the slot
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pipeline) = guard.as_ref() {
            return Ok(Arc::clone(pipeline));
        }

        info!(
            "Creating new pipeline for language code: {} on {}",
            key.language_code, key.device
        );
        let pipeline = self.factory.create(key).map_err(SpeechError::PipelineInit)?;
        *guard = Some(Arc::clone(&pipeline));
        self.built.fetch_add(1, Ordering::Relaxed);
        Ok(pipeline)
    }

    /// Number of constructed pipelines. Never waits on a construction in
    /// progress.
    pub fn len(&self) -> usize {
        self.built.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::time::{Duration, Instant};

    struct NullPipeline;

    impl SpeechPipeline for NullPipeline {
        fn synthesize<'a>(&'a self, _text: &str, _voice_id: &str) -> anyhow::Result<SynthesisSteps<'a>> {
            Ok(Box::new(std::iter::empty()))
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicUsize,
        delay: Option<Duration>,
        fail_first: bool,
        panic_first: bool,
    }

    impl PipelineFactory for CountingFactory {
        fn create(&self, _key: &PipelineKey) -> anyhow::Result<Arc<dyn SpeechPipeline>> {
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            let n = self.created.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                anyhow::bail!("model file missing");
            }
            if self.panic_first && n == 0 {
                panic!("corrupt model");
            }
            let pipeline: Arc<dyn SpeechPipeline> = Arc::new(NullPipeline);
            Ok(pipeline)
        }
    }

    #[test]
    fn test_same_key_returns_same_handle() {
        let factory = Arc::new(CountingFactory::default());
        let cache = PipelineCache::new(factory.clone());

        let first = cache.get_pipeline("a", Device::Cpu).unwrap();
        let second = cache.get_pipeline("a", Device::Cpu).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_distinct_keys_construct_once_each() {
        let factory = Arc::new(CountingFactory::default());
        let cache = PipelineCache::new(factory.clone());

        for _ in 0..3 {
            cache.get_pipeline("a", Device::Cpu).unwrap();
            cache.get_pipeline("a", Device::Gpu).unwrap();
            cache.get_pipeline("h", Device::Cpu).unwrap();
        }
        assert_eq!(factory.created.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len(), 3);

        let cpu = cache.get_pipeline("a", Device::Cpu).unwrap();
        let gpu = cache.get_pipeline("a", Device::Gpu).unwrap();
        assert!(!Arc::ptr_eq(&cpu, &gpu));
    }

    #[test]
    fn test_concurrent_requests_construct_once() {
        let factory = Arc::new(CountingFactory {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let cache = Arc::new(PipelineCache::new(factory.clone()));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    cache.get_pipeline("a", Device::Cpu).unwrap()
                })
            })
            .collect();

        let pipelines: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert!(pipelines.iter().all(|p| Arc::ptr_eq(p, &pipelines[0])));
    }

    #[test]
    fn test_failed_construction_is_retried() {
        let factory = Arc::new(CountingFactory {
            fail_first: true,
            ..Default::default()
        });
        let cache = PipelineCache::new(factory.clone());

        let err = cache.get_pipeline("a", Device::Cpu).err().unwrap();
        assert!(matches!(err, SpeechError::PipelineInit(_)));
        assert!(cache.is_empty());

        cache.get_pipeline("a", Device::Cpu).unwrap();
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_panicking_construction_is_retried() {
        let factory = Arc::new(CountingFactory {
            panic_first: true,
            ..Default::default()
        });
        let cache = Arc::new(PipelineCache::new(factory.clone()));

        let first = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || cache.get_pipeline("a", Device::Cpu).is_ok()).join()
        };
        assert!(first.is_err());
        assert!(cache.is_empty());

        cache.get_pipeline("a", Device::Cpu).unwrap();
        let again = cache.get_pipeline("a", Device::Cpu).unwrap();
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
        assert!(Arc::ptr_eq(&again, &cache.get_pipeline("a", Device::Cpu).unwrap()));
    }

    #[test]
    fn test_len_does_not_wait_for_construction() {
        let factory = Arc::new(CountingFactory {
            delay: Some(Duration::from_millis(500)),
            ..Default::default()
        });
        let cache = Arc::new(PipelineCache::new(factory));

        let loading = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || cache.get_pipeline("a", Device::Cpu).is_ok())
        };
        std::thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        assert_eq!(cache.len(), 0);
        assert!(started.elapsed() < Duration::from_millis(200));

        assert!(loading.join().unwrap());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_segments_from_f32_and_f64_samples() {
        let single = AudioSegment::from(vec![0.5f32, -0.25]);
        assert_eq!(single.into_vec(), vec![0.5, -0.25]);

        let narrowed = AudioSegment::from(vec![0.5f64, -0.25, 1.0e-3]);
        assert_eq!(narrowed.len(), 3);
        assert_eq!(narrowed.0, vec![0.5f32, -0.25, 1.0e-3]);
        assert!(AudioSegment::from(Vec::<f64>::new()).is_empty());
    }
}

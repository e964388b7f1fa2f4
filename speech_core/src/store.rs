//! Output directory for generated audio files.

use std::path::{Path, PathBuf};

use crate::device::Device;
use crate::error::SpeechError;
use crate::wav;

#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
}

impl AudioStore {
    /// Use `dir` as the output directory, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `output_{voice}_{device}_{epoch_millis}.wav`
    pub fn file_name_for(voice_id: &str, device: Device, epoch_millis: i64) -> String {
        format!("output_{voice_id}_{device}_{epoch_millis}.wav")
    }

    /// Path of a stored file, or `None` when `name` could escape the directory.
    pub fn path_for(&self, name: &str) -> Option<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && !name.contains("..")
            && !name.contains(['/', '\\', '\0']);
        valid.then(|| self.dir.join(name))
    }

    /// Write samples as a 24 kHz WAV under `name`.
    pub fn write(&self, name: &str, samples: &[f32]) -> Result<PathBuf, SpeechError> {
        let path = self.dir.join(name);
        wav::write_wav_file(&path, samples, wav::SAMPLE_RATE).map_err(|source| {
            SpeechError::Persistence {
                path: path.clone(),
                source,
            }
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_format() {
        assert_eq!(
            AudioStore::file_name_for("af_nicole", Device::Cpu, 1_700_000_000_123),
            "output_af_nicole_cpu_1700000000123.wav"
        );
        assert_eq!(
            AudioStore::file_name_for("hf_beta", Device::Gpu, 42),
            "output_hf_beta_cuda_42.wav"
        );
    }

    #[test]
    fn test_path_for_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::open(dir.path()).unwrap();

        assert!(store.path_for("output_af_nicole_cpu_1.wav").is_some());
        assert!(store.path_for("../secret.wav").is_none());
        assert!(store.path_for("nested/file.wav").is_none());
        assert!(store.path_for("..").is_none());
        assert!(store.path_for("").is_none());
    }

    #[test]
    fn test_open_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("static").join("audio");
        let store = AudioStore::open(&nested).unwrap();
        assert!(store.dir().is_dir());
    }

    #[test]
    fn test_write_failure_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::open(dir.path()).unwrap();
        std::fs::remove_dir(dir.path()).unwrap();

        let err = store.write("output.wav", &[0.0]).unwrap_err();
        assert!(matches!(err, SpeechError::Persistence { .. }));
    }
}

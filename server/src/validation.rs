use speech_core::{Device, DEFAULT_VOICE_ID};

use crate::error::ApiError;

/// Maximum text length (in characters) for TTS requests
pub const MAX_TEXT_LENGTH: usize = 5000;

/// Validate the text of a TTS request, returning it on success.
pub fn validate_tts_text(text: Option<&str>) -> Result<&str, ApiError> {
    let text = match text {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Err(ApiError::InvalidInput("No text provided".to_string())),
    };
    if text.chars().count() > MAX_TEXT_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Text too long (max {} characters)",
            MAX_TEXT_LENGTH
        )));
    }
    Ok(text)
}

/// Requested voice, defaulting to `af_nicole` when absent or blank.
/// Unknown ids are left for the voice registry to substitute.
pub fn voice_or_default(voice: Option<&str>) -> &str {
    match voice.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => DEFAULT_VOICE_ID,
    }
}

/// Requested device, defaulting to CPU when absent or blank.
pub fn parse_device(device: Option<&str>) -> Result<Device, ApiError> {
    match device.map(str::trim) {
        None | Some("") => Ok(Device::Cpu),
        Some(d) => d
            .parse()
            .map_err(|e: speech_core::UnknownDevice| ApiError::InvalidInput(e.to_string())),
    }
}

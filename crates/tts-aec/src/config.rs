//! Session configuration.

use tts_aec_core::{DEFAULT_STREAM_DELAY_MS, MAX_STREAM_DELAY_MS};

/// Configuration fixed at session creation.
///
/// The sample rate and channel count exist so callers state their stream
/// format explicitly; creation fails for anything other than 48 kHz mono.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Must be 48000.
    pub sample_rate_hz: usize,
    /// Must be 1.
    pub channels: usize,
    /// Conservative adaptation for mobile loudspeaker/microphone layouts:
    /// slower step size and stronger residual suppression.
    pub mobile_mode: bool,
    /// Initial render-to-capture delay estimate in milliseconds.
    pub stream_delay_ms: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: tts_aec_core::SAMPLE_RATE_HZ,
            channels: 1,
            mobile_mode: false,
            stream_delay_ms: DEFAULT_STREAM_DELAY_MS,
        }
    }
}

impl SessionConfig {
    /// NLMS step size derived from the adaptation mode.
    pub(crate) fn step_size(&self) -> f32 {
        if self.mobile_mode { 0.05 } else { 0.1 }
    }

    /// Residual suppressor blend factor derived from the adaptation mode.
    pub(crate) fn suppression(&self) -> f32 {
        if self.mobile_mode { 0.8 } else { 0.7 }
    }

    /// Clamps a declared stream delay into the supported range.
    pub(crate) fn clamp_stream_delay(delay_ms: usize) -> usize {
        delay_ms.min(MAX_STREAM_DELAY_MS)
    }
}

//! Public session facade.
//!
//! Validates inputs, owns the session lifecycle, and forwards blocks to the
//! DSP pipeline in `tts-aec-core`. The session is single-threaded by
//! contract: one caller drives `analyze_render` and `process_capture` in
//! temporal interleaving; distinct sessions are fully independent.

use tts_aec_core::{delay_samples_to_ms, BlockProcessor, ProcessorConfig, BLOCK_SIZE};

use crate::config::SessionConfig;
use crate::stats::SessionStats;

// ─── Error ───────────────────────────────────────────────────────────

/// Errors returned by session operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The configured sample rate is not 48 kHz.
    BadSampleRate,
    /// The configured channel count is not mono.
    BadNumberChannels,
    /// An audio buffer did not hold exactly one 480-sample block.
    BadBlockLength,
    /// The session was destroyed.
    NotInitialized,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadSampleRate => write!(f, "sample rate must be 48000 Hz"),
            Self::BadNumberChannels => write!(f, "channel count must be 1"),
            Self::BadBlockLength => {
                write!(f, "audio buffers must hold exactly {BLOCK_SIZE} samples")
            }
            Self::NotInitialized => write!(f, "session is not initialized"),
        }
    }
}

impl std::error::Error for Error {}

// ─── Format validation ──────────────────────────────────────────────

/// Returns whether the session supports the given sample rate.
pub fn is_valid_sample_rate(sample_rate_hz: usize) -> bool {
    sample_rate_hz == tts_aec_core::SAMPLE_RATE_HZ
}

/// Returns whether a buffer length is exactly one processing block.
pub fn is_valid_block_len(len: usize) -> bool {
    len == BLOCK_SIZE
}

fn validate_config(config: &SessionConfig) -> Result<(), Error> {
    if !is_valid_sample_rate(config.sample_rate_hz) {
        return Err(Error::BadSampleRate);
    }
    if config.channels != 1 {
        return Err(Error::BadNumberChannels);
    }
    Ok(())
}

fn validate_block(block: &[f32]) -> Result<(), Error> {
    if is_valid_block_len(block.len()) {
        Ok(())
    } else {
        Err(Error::BadBlockLength)
    }
}

// ─── EchoSession ────────────────────────────────────────────────────

/// One echo cancellation session.
///
/// Created in the ready state; [`destroy`](Self::destroy) releases the DSP
/// state explicitly and is idempotent. Every operation on a destroyed
/// session fails with [`Error::NotInitialized`] or is a no-op; none panic.
#[derive(Debug)]
pub struct EchoSession {
    config: SessionConfig,
    stream_delay_ms: usize,
    /// `None` once destroyed.
    processor: Option<BlockProcessor>,
}

impl EchoSession {
    /// Creates a session, validating the configuration and allocating all
    /// buffers up front. Processing itself never allocates.
    pub fn new(config: SessionConfig) -> Result<Self, Error> {
        validate_config(&config)?;
        let stream_delay_ms = SessionConfig::clamp_stream_delay(config.stream_delay_ms);
        let processor = BlockProcessor::new(ProcessorConfig {
            step_size: config.step_size(),
            suppression: config.suppression(),
            stream_delay_ms,
        });
        Ok(Self {
            config,
            stream_delay_ms,
            processor: Some(processor),
        })
    }

    /// Submits one block of the far-end (TTS/reference) signal, ideally
    /// shortly before it reaches the loudspeaker.
    pub fn analyze_render(&mut self, far_end: &[f32]) -> Result<(), Error> {
        validate_block(far_end)?;
        let processor = self.processor.as_mut().ok_or(Error::NotInitialized)?;
        processor.buffer_render(far_end);
        Ok(())
    }

    /// Processes one captured microphone block, writing the echo-cancelled
    /// signal to `out`.
    ///
    /// `level_change` hints that the playback gain just changed; adaptation
    /// is inhibited for this block.
    pub fn process_capture(
        &mut self,
        mic: &[f32],
        out: &mut [f32],
        level_change: bool,
    ) -> Result<(), Error> {
        validate_block(mic)?;
        validate_block(out)?;
        let processor = self.processor.as_mut().ok_or(Error::NotInitialized)?;
        processor.process_capture(mic, out, level_change);
        Ok(())
    }

    /// Declares the caller's best estimate of the render-to-capture loop
    /// delay. Values are clamped to [0, 500] ms. Never touches the filter
    /// coefficients; a no-op on a destroyed session.
    pub fn set_stream_delay_ms(&mut self, delay_ms: usize) {
        let clamped = SessionConfig::clamp_stream_delay(delay_ms);
        if clamped != delay_ms {
            tracing::warn!(
                requested_ms = delay_ms,
                clamped_ms = clamped,
                "stream delay out of range; clamped"
            );
        }
        self.stream_delay_ms = clamped;
        if let Some(processor) = self.processor.as_mut() {
            processor.set_stream_delay_ms(clamped);
        }
    }

    /// The declared stream delay after clamping.
    pub fn stream_delay_ms(&self) -> usize {
        self.stream_delay_ms
    }

    /// Current echo return loss enhancement in dB; 0 on a destroyed session.
    pub fn erle_db(&self) -> f32 {
        self.processor.as_ref().map_or(0.0, BlockProcessor::erle_db)
    }

    /// The delay used for alignment in the most recent capture block, in
    /// milliseconds; 0 on a destroyed session.
    pub fn detected_delay_ms(&self) -> usize {
        self.processor
            .as_ref()
            .map_or(0, |p| delay_samples_to_ms(p.detected_delay_samples()))
    }

    /// Snapshot of the session metrics.
    pub fn stats(&self) -> SessionStats {
        match self.processor.as_ref() {
            Some(processor) => SessionStats {
                erle_db: processor.erle_db(),
                detected_delay_ms: delay_samples_to_ms(processor.detected_delay_samples()),
                divergence_count: processor.divergence_count(),
            },
            None => SessionStats::default(),
        }
    }

    /// Flushes filter state, reference history, and metric accumulators.
    /// Configuration and the declared stream delay are preserved. A no-op on
    /// a destroyed session.
    pub fn reset(&mut self) {
        if let Some(processor) = self.processor.as_mut() {
            processor.reset();
        }
    }

    /// Releases all DSP state. Idempotent; further operations fail with
    /// [`Error::NotInitialized`] rather than panicking.
    pub fn destroy(&mut self) {
        self.processor = None;
    }

    /// Whether the session is still usable.
    pub fn is_initialized(&self) -> bool {
        self.processor.is_some()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

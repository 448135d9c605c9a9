//! DSP components for single-channel acoustic echo cancellation.
//!
//! This crate holds the block-synchronous pipeline used to remove the
//! acoustic echo of a locally played TTS stream from a microphone capture:
//! a ring-buffered reference history, a cross-correlation delay estimator,
//! a time-domain NLMS adaptive filter with a divergence guard, a residual
//! suppressor, and an ERLE metric.
//!
//! The public entry point is [`BlockProcessor`]; the session-level API with
//! input validation and lifecycle handling lives in the `tts-aec` crate.

#![deny(unsafe_code)]

pub mod block_processor;
pub mod common;
pub mod delay_estimator;
pub mod erle_estimator;
pub mod nlms_filter;
pub mod render_history;
pub mod residual_suppressor;

pub use block_processor::{BlockProcessor, ProcessorConfig};
pub use common::{
    delay_ms_to_samples, delay_samples_to_ms, BLOCK_SIZE, DEFAULT_STREAM_DELAY_MS, FILTER_LENGTH,
    MAX_DELAY_MS, MAX_STREAM_DELAY_MS, SAMPLE_RATE_HZ,
};

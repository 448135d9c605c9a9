//! Pipeline constants and small utility functions.

/// The only supported sample rate.
pub const SAMPLE_RATE_HZ: usize = 48_000;

/// Samples per block (10 ms at 48 kHz). All processing is block-synchronous.
pub const BLOCK_SIZE: usize = 480;

pub const NUM_BLOCKS_PER_SECOND: usize = 100;

/// Samples per millisecond at the fixed rate.
pub const SAMPLES_PER_MS: usize = SAMPLE_RATE_HZ / 1000;

/// Number of taps in the adaptive FIR filter.
pub const FILTER_LENGTH: usize = 128;

/// Conservative ceiling on the render-to-capture loop delay covered by the
/// reference history.
pub const MAX_DELAY_MS: usize = 200;

pub const MAX_DELAY_SAMPLES: usize = MAX_DELAY_MS * SAMPLES_PER_MS;

/// Upper clamp for caller-declared stream delays.
pub const MAX_STREAM_DELAY_MS: usize = 500;

pub const DEFAULT_STREAM_DELAY_MS: usize = 100;

/// Capacity of the reference history ring. Covers the worst-case alignment
/// window: maximum delay plus one capture block plus the filter span.
pub const RENDER_HISTORY_CAPACITY: usize = MAX_DELAY_SAMPLES + BLOCK_SIZE + FILTER_LENGTH;

/// Length of the delay-aligned reference window consumed per capture block.
pub const ALIGNED_WINDOW_LENGTH: usize = FILTER_LENGTH - 1 + BLOCK_SIZE;

/// Regularisation added to the reference energy in the NLMS update.
pub(crate) const NLMS_EPSILON: f32 = 1e-6;

/// Coefficient magnitude beyond which the filter is considered divergent.
pub(crate) const TAP_MAGNITUDE_LIMIT: f32 = 4.0;

/// Near-end/far-end block energy ratio above which adaptation is frozen
/// (+6 dB, the minimum viable double-talk gate).
pub(crate) const DOUBLE_TALK_GATE_RATIO: f32 = 3.981_072;

/// Mean-square block energy below which the far end counts as inactive.
pub(crate) const FAR_END_ACTIVITY_THRESHOLD: f32 = 1e-6;

/// Per-block smoothing constant for the energy EWMAs.
pub(crate) const ENERGY_SMOOTHING: f32 = 0.95;

/// ERLE readings are clamped to [0, ERLE_MAX_DB].
pub(crate) const ERLE_MAX_DB: f32 = 40.0;

/// Floor applied to energies before forming the ERLE ratio.
pub(crate) const ENERGY_FLOOR: f32 = 1e-10;

/// Converts a delay in milliseconds to samples at the fixed rate.
pub const fn delay_ms_to_samples(delay_ms: usize) -> usize {
    delay_ms * SAMPLES_PER_MS
}

/// Converts a delay in samples to whole milliseconds, rounding to nearest.
pub const fn delay_samples_to_ms(delay_samples: usize) -> usize {
    (delay_samples + SAMPLES_PER_MS / 2) / SAMPLES_PER_MS
}

/// Mean of the squared samples in a block.
pub(crate) fn mean_square(block: &[f32]) -> f32 {
    if block.is_empty() {
        return 0.0;
    }
    let sum: f32 = block.iter().map(|x| x * x).sum();
    sum / block.len() as f32
}

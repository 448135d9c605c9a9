//! Render-to-capture delay estimation via cross-correlation.
//!
//! The caller-declared stream delay anchors the alignment. Every few capture
//! blocks a normalised cross-correlation search over a +/-30 ms window around
//! that anchor looks for a lag that matches the acoustic path better. Both
//! signals are decimated before correlating, which bounds the search cost and
//! gives a lag resolution of one decimated sample.
//!
//! A new lag is adopted only when its correlation clears an absolute
//! threshold, clearly beats the correlation at the current lag, and wins two
//! searches in a row. Periodic references (a steady TTS tone) produce equal
//! peaks at every period; the relative-improvement rule keeps the estimate
//! anchored instead of hopping between ambiguous peaks.

use crate::common::{delay_ms_to_samples, BLOCK_SIZE, SAMPLES_PER_MS};
use crate::render_history::RenderHistory;

/// Both signals are decimated by this factor before correlating.
pub const DECIMATION_FACTOR: usize = 8;

/// Search radius around the anchor delay.
const SEARCH_RADIUS_MS: usize = 30;
const SEARCH_RADIUS_SAMPLES: usize = SEARCH_RADIUS_MS * SAMPLES_PER_MS;

/// A search runs once per this many capture blocks.
const SEARCH_INTERVAL_BLOCKS: usize = 10;

/// Minimum normalised correlation for a candidate lag.
const CORRELATION_THRESHOLD: f32 = 0.6;

/// A candidate must beat the correlation at the current lag by this factor.
const IMPROVEMENT_FACTOR: f32 = 1.1;

/// Consecutive winning searches required before a candidate is adopted.
const REQUIRED_CONSISTENT_SEARCHES: usize = 2;

/// Mean-square energy below which a decimated signal is too weak to search.
const EXCITATION_THRESHOLD: f32 = 1e-6;

const MAX_WINDOW_LEN: usize = 2 * SEARCH_RADIUS_SAMPLES + BLOCK_SIZE;
const CAPTURE_DEC_LEN: usize = BLOCK_SIZE / DECIMATION_FACTOR;

/// Tracks the delay used to align the reference history with capture blocks.
#[derive(Debug, Clone)]
pub struct DelayEstimator {
    anchor_samples: usize,
    detected_samples: usize,
    blocks_since_search: usize,
    candidate_samples: Option<usize>,
    candidate_hits: usize,
    window: Vec<f32>,
    window_dec: Vec<f32>,
    capture_dec: [f32; CAPTURE_DEC_LEN],
}

impl DelayEstimator {
    pub fn new(stream_delay_ms: usize) -> Self {
        let anchor = delay_ms_to_samples(stream_delay_ms);
        Self {
            anchor_samples: anchor,
            detected_samples: anchor,
            blocks_since_search: 0,
            candidate_samples: None,
            candidate_hits: 0,
            window: vec![0.0; MAX_WINDOW_LEN],
            window_dec: vec![0.0; MAX_WINDOW_LEN / DECIMATION_FACTOR],
            capture_dec: [0.0; CAPTURE_DEC_LEN],
        }
    }

    /// The delay currently used for alignment, in samples.
    pub fn detected_delay_samples(&self) -> usize {
        self.detected_samples
    }

    /// Moves the anchor to a new caller-declared delay and discards any
    /// refinement derived from the old anchor.
    pub fn re_anchor(&mut self, stream_delay_ms: usize) {
        let anchor = delay_ms_to_samples(stream_delay_ms);
        self.anchor_samples = anchor;
        self.detected_samples = anchor;
        self.candidate_samples = None;
        self.candidate_hits = 0;
    }

    /// Returns to the anchored delay and restarts the search cadence.
    pub fn reset(&mut self) {
        self.detected_samples = self.anchor_samples;
        self.blocks_since_search = 0;
        self.candidate_samples = None;
        self.candidate_hits = 0;
    }

    /// Called once per capture block; runs the correlation search on every
    /// `SEARCH_INTERVAL_BLOCKS`-th call.
    pub fn update(&mut self, history: &RenderHistory, capture: &[f32]) {
        debug_assert_eq!(BLOCK_SIZE, capture.len());

        self.blocks_since_search += 1;
        if self.blocks_since_search < SEARCH_INTERVAL_BLOCKS {
            return;
        }
        self.blocks_since_search = 0;
        self.search(history, capture);
    }

    fn search(&mut self, history: &RenderHistory, capture: &[f32]) {
        let lag_min = self.anchor_samples.saturating_sub(SEARCH_RADIUS_SAMPLES);
        let span = (self.anchor_samples + SEARCH_RADIUS_SAMPLES - lag_min)
            / DECIMATION_FACTOR
            * DECIMATION_FACTOR;
        let len = span + BLOCK_SIZE;

        history.fill_window(lag_min, &mut self.window[..len]);
        let dec_len = len / DECIMATION_FACTOR;
        decimate(&self.window[..len], &mut self.window_dec[..dec_len]);
        decimate(capture, &mut self.capture_dec);

        let capture_energy: f32 = self.capture_dec.iter().map(|x| x * x).sum();
        let window_energy: f32 = self.window_dec[..dec_len].iter().map(|x| x * x).sum();
        if capture_energy / (CAPTURE_DEC_LEN as f32) < EXCITATION_THRESHOLD
            || window_energy / (dec_len as f32) < EXCITATION_THRESHOLD
        {
            self.candidate_samples = None;
            self.candidate_hits = 0;
            return;
        }

        // Candidate k corresponds to lag `lag_min + k * DECIMATION_FACTOR`;
        // its aligned reference is window_dec[span_dec - k ..][..CAPTURE_DEC_LEN].
        let span_dec = span / DECIMATION_FACTOR;
        let mut best_k = 0;
        let mut best_score = -1.0f32;
        for k in 0..=span_dec {
            let score = self.score_at(span_dec - k, capture_energy);
            if score > best_score {
                best_score = score;
                best_k = k;
            }
        }

        // Correlation at (the grid point nearest to) the lag in use.
        let current_k = (self.detected_samples.saturating_sub(lag_min) / DECIMATION_FACTOR)
            .min(span_dec);
        let current_score = self.score_at(span_dec - current_k, capture_energy);

        let best_lag = lag_min + best_k * DECIMATION_FACTOR;
        let shift = best_lag.abs_diff(self.detected_samples);

        if best_score < CORRELATION_THRESHOLD
            || shift <= DECIMATION_FACTOR
            || best_score <= IMPROVEMENT_FACTOR * current_score
        {
            self.candidate_samples = None;
            self.candidate_hits = 0;
            return;
        }

        match self.candidate_samples {
            Some(previous) if previous.abs_diff(best_lag) <= DECIMATION_FACTOR => {
                self.candidate_hits += 1;
            }
            _ => {
                self.candidate_samples = Some(best_lag);
                self.candidate_hits = 1;
            }
        }

        if self.candidate_hits >= REQUIRED_CONSISTENT_SEARCHES {
            tracing::debug!(
                old_delay_samples = self.detected_samples,
                new_delay_samples = best_lag,
                score = best_score,
                "delay estimate updated"
            );
            self.detected_samples = best_lag;
            self.candidate_samples = None;
            self.candidate_hits = 0;
        }
    }

    /// Normalised correlation between the decimated capture block and the
    /// decimated reference starting at `offset`.
    fn score_at(&self, offset: usize, capture_energy: f32) -> f32 {
        let reference = &self.window_dec[offset..offset + CAPTURE_DEC_LEN];
        let mut dot = 0.0f32;
        let mut ref_energy = 0.0f32;
        for (&c, &r) in self.capture_dec.iter().zip(reference) {
            dot += c * r;
            ref_energy += r * r;
        }
        dot.abs() / (capture_energy * ref_energy).sqrt().max(1e-12)
    }
}

/// Boxcar decimation: each output sample is the mean of `DECIMATION_FACTOR`
/// consecutive inputs.
fn decimate(input: &[f32], output: &mut [f32]) {
    debug_assert_eq!(input.len(), output.len() * DECIMATION_FACTOR);
    for (out, group) in output.iter_mut().zip(input.chunks_exact(DECIMATION_FACTOR)) {
        *out = group.iter().sum::<f32>() / DECIMATION_FACTOR as f32;
    }
}

//! Block-level echo cancellation pipeline.
//!
//! Sequences the reference history, delay estimator, NLMS filter, residual
//! suppressor, and ERLE estimator for one render or capture block at a time.
//! All buffers are allocated at construction; the steady-state path performs
//! no allocation.

use crate::common::{
    mean_square, ALIGNED_WINDOW_LENGTH, BLOCK_SIZE, DOUBLE_TALK_GATE_RATIO,
    FAR_END_ACTIVITY_THRESHOLD, FILTER_LENGTH, NUM_BLOCKS_PER_SECOND,
};
use crate::delay_estimator::DelayEstimator;
use crate::erle_estimator::ErleEstimator;
use crate::nlms_filter::NlmsFilter;
use crate::render_history::RenderHistory;
use crate::residual_suppressor::ResidualSuppressor;

/// Number of recent blocks over which repeated divergences force a full
/// pipeline reset.
const DIVERGENCE_WINDOW_BLOCKS: usize = NUM_BLOCKS_PER_SECOND;

/// Divergences within the window that trigger the reset.
const DIVERGENCE_RESET_COUNT: usize = 3;

/// Tuning derived from the session configuration.
#[derive(Debug, Clone, Copy)]
pub struct ProcessorConfig {
    /// NLMS step size.
    pub step_size: f32,
    /// Residual suppressor blend factor.
    pub suppression: f32,
    /// Caller-declared render-to-capture delay.
    pub stream_delay_ms: usize,
}

/// One echo cancellation pipeline instance.
#[derive(Debug)]
pub struct BlockProcessor {
    render_history: RenderHistory,
    delay_estimator: DelayEstimator,
    filter: NlmsFilter,
    suppressor: ResidualSuppressor,
    erle: ErleEstimator,
    /// Delay-aligned reference scratch, filled once per capture block.
    window: Vec<f32>,
    /// Prediction error scratch.
    error: Vec<f32>,
    capture_block_counter: usize,
    /// Capture block indices of recent divergences.
    divergence_blocks: Vec<usize>,
    divergence_count: u64,
    /// Set when the guard fired; adaptation skips the following block.
    freeze_next_block: bool,
}

impl BlockProcessor {
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            render_history: RenderHistory::new(),
            delay_estimator: DelayEstimator::new(config.stream_delay_ms),
            filter: NlmsFilter::new(config.step_size),
            suppressor: ResidualSuppressor::new(config.suppression),
            erle: ErleEstimator::new(),
            window: vec![0.0; ALIGNED_WINDOW_LENGTH],
            error: vec![0.0; BLOCK_SIZE],
            capture_block_counter: 0,
            divergence_blocks: Vec::with_capacity(DIVERGENCE_RESET_COUNT),
            divergence_count: 0,
            freeze_next_block: false,
        }
    }

    /// Appends one reference block to the history.
    pub fn buffer_render(&mut self, far_end: &[f32]) {
        debug_assert_eq!(BLOCK_SIZE, far_end.len());
        self.render_history.push_block(far_end);
    }

    /// Cancels the echo in one capture block.
    ///
    /// `level_change` signals that the playback gain just changed; adaptation
    /// is inhibited for this block so the stale echo path estimate is not
    /// dragged toward a transient.
    pub fn process_capture(&mut self, mic: &[f32], out: &mut [f32], level_change: bool) {
        debug_assert_eq!(BLOCK_SIZE, mic.len());
        debug_assert_eq!(BLOCK_SIZE, out.len());

        self.capture_block_counter += 1;
        self.delay_estimator.update(&self.render_history, mic);

        let delay = self.delay_estimator.detected_delay_samples();
        self.render_history.fill_window(delay, &mut self.window);

        // Energies over the block-aligned part of the window and the capture.
        let reference_energy = mean_square(&self.window[FILTER_LENGTH - 1..]);
        let capture_energy = mean_square(mic);
        let far_end_active = reference_energy > FAR_END_ACTIVITY_THRESHOLD;

        let double_talk = capture_energy > DOUBLE_TALK_GATE_RATIO * reference_energy;
        let adapt = !level_change && !double_talk && !self.freeze_next_block;
        self.freeze_next_block = false;

        let outcome = self
            .filter
            .process_block(&self.window, mic, &mut self.error, adapt);

        self.suppressor
            .process_block(mic, &self.error, far_end_active, out);
        self.erle.update(mic, out);

        if outcome.diverged {
            self.handle_divergence();
        }
    }

    fn handle_divergence(&mut self) {
        self.divergence_count += 1;
        self.freeze_next_block = true;

        let now = self.capture_block_counter;
        self.divergence_blocks
            .retain(|&block| now - block < DIVERGENCE_WINDOW_BLOCKS);
        self.divergence_blocks.push(now);

        if self.divergence_blocks.len() >= DIVERGENCE_RESET_COUNT {
            tracing::warn!(
                window_blocks = DIVERGENCE_WINDOW_BLOCKS,
                "repeated filter divergence; resetting pipeline state"
            );
            let total = self.divergence_count;
            self.reset();
            self.divergence_count = total;
        }
    }

    /// Declares a new stream delay. Does not touch the filter coefficients.
    pub fn set_stream_delay_ms(&mut self, delay_ms: usize) {
        self.delay_estimator.re_anchor(delay_ms);
    }

    /// The delay used for alignment in the most recent capture block, in
    /// samples.
    pub fn detected_delay_samples(&self) -> usize {
        self.delay_estimator.detected_delay_samples()
    }

    pub fn erle_db(&self) -> f32 {
        self.erle.erle_db()
    }

    /// Total divergence-guard activations over the session lifetime.
    pub fn divergence_count(&self) -> u64 {
        self.divergence_count
    }

    /// Zeroes filter coefficients, reference history, energy accumulators,
    /// and the delay refinement. Configuration (step size, suppression,
    /// declared delay) is preserved.
    pub fn reset(&mut self) {
        self.render_history.clear();
        self.filter.reset();
        self.erle.reset();
        self.delay_estimator.reset();
        self.capture_block_counter = 0;
        self.divergence_blocks.clear();
        self.divergence_count = 0;
        self.freeze_next_block = false;
    }
}

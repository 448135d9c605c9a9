//! Time-domain normalised LMS adaptive FIR filter.
//!
//! Predicts the echo in the capture signal from a delay-aligned reference
//! window and subtracts it. The per-sample update normalises the step by the
//! energy of the reference span under the filter, so convergence speed is
//! independent of the reference level.

use crate::common::{BLOCK_SIZE, FILTER_LENGTH, NLMS_EPSILON, TAP_MAGNITUDE_LIMIT};

/// Outcome of processing one capture block through the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOutcome {
    /// The divergence guard fired and the coefficients were zeroed.
    pub diverged: bool,
}

/// NLMS FIR filter over the aligned reference.
///
/// Taps are stored time-ascending: `taps[FILTER_LENGTH - 1]` weights the
/// reference sample aligned with the current capture sample and `taps[0]` the
/// oldest sample in the filter span.
#[derive(Debug, Clone)]
pub struct NlmsFilter {
    taps: Vec<f32>,
    step_size: f32,
}

impl NlmsFilter {
    pub fn new(step_size: f32) -> Self {
        Self {
            taps: vec![0.0; FILTER_LENGTH],
            step_size,
        }
    }

    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    /// Zeroes the coefficients, discarding the echo path estimate.
    pub fn reset(&mut self) {
        self.taps.fill(0.0);
    }

    /// Filters one capture block against the aligned reference `window` and
    /// writes the prediction error (the echo-subtracted signal) to `error`.
    ///
    /// `window` must hold `FILTER_LENGTH - 1 + BLOCK_SIZE` samples ordered
    /// oldest-first such that `window[FILTER_LENGTH - 1 + i]` is the reference
    /// sample aligned with `mic[i]`.
    ///
    /// When `adapt` is false the coefficients are left untouched (adaptation
    /// freeze); the echo estimate is still subtracted.
    pub fn process_block(
        &mut self,
        window: &[f32],
        mic: &[f32],
        error: &mut [f32],
        adapt: bool,
    ) -> FilterOutcome {
        debug_assert_eq!(FILTER_LENGTH - 1 + BLOCK_SIZE, window.len());
        debug_assert_eq!(BLOCK_SIZE, mic.len());
        debug_assert_eq!(BLOCK_SIZE, error.len());

        for i in 0..BLOCK_SIZE {
            let span = &window[i..i + FILTER_LENGTH];

            let mut estimate = 0.0f32;
            let mut span_energy = 0.0f32;
            for (tap, &x) in self.taps.iter().zip(span) {
                estimate += tap * x;
                span_energy += x * x;
            }

            let e = mic[i] - estimate;
            error[i] = e;

            if adapt {
                let scale = self.step_size * e / (span_energy + NLMS_EPSILON);
                for (tap, &x) in self.taps.iter_mut().zip(span) {
                    *tap += scale * x;
                }
            }
        }

        if self.is_divergent() {
            self.taps.fill(0.0);
            tracing::warn!("adaptive filter diverged; coefficients reset");
            return FilterOutcome { diverged: true };
        }
        FilterOutcome { diverged: false }
    }

    fn is_divergent(&self) -> bool {
        self.taps
            .iter()
            .any(|tap| !tap.is_finite() || tap.abs() > TAP_MAGNITUDE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ALIGNED_WINDOW_LENGTH;

    /// Deterministic white-ish noise in [-1, 1).
    fn lcg_noise(seed: &mut u64) -> f32 {
        *seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        ((*seed >> 33) as f32 / (1u64 << 31) as f32) - 1.0
    }

    /// Builds the aligned window and echo block for a flat echo path with a
    /// single active tap.
    fn echo_block(
        reference: &[f32],
        block_start: usize,
        tap_offset: usize,
        gain: f32,
    ) -> ([f32; ALIGNED_WINDOW_LENGTH], [f32; BLOCK_SIZE]) {
        let mut window = [0.0f32; ALIGNED_WINDOW_LENGTH];
        for (k, w) in window.iter_mut().enumerate() {
            let idx = block_start + k;
            *w = if idx >= FILTER_LENGTH - 1 {
                reference[idx - (FILTER_LENGTH - 1)]
            } else {
                0.0
            };
        }
        let mut mic = [0.0f32; BLOCK_SIZE];
        for (i, m) in mic.iter_mut().enumerate() {
            // window[FILTER_LENGTH - 1 + i - tap_offset] is the echo source.
            *m = gain * window[FILTER_LENGTH - 1 + i - tap_offset];
        }
        (window, mic)
    }

    #[test]
    fn converges_on_single_tap_echo_path() {
        let mut seed = 0x1234_5678u64;
        let num_blocks = 40;
        let total = num_blocks * BLOCK_SIZE + ALIGNED_WINDOW_LENGTH;
        let reference: Vec<f32> = (0..total).map(|_| 0.5 * lcg_noise(&mut seed)).collect();

        let mut filter = NlmsFilter::new(0.1);
        let mut error = [0.0f32; BLOCK_SIZE];
        let mut last_block_energy = 0.0;
        for b in 0..num_blocks {
            let (window, mic) = echo_block(&reference, b * BLOCK_SIZE, 10, 0.5);
            filter.process_block(&window, &mic, &mut error, true);
            last_block_energy = error.iter().map(|e| e * e).sum::<f32>() / BLOCK_SIZE as f32;
        }

        // Residual energy far below the 0.5^2 * reference energy of the echo.
        assert!(
            last_block_energy < 1e-4,
            "filter failed to converge, residual energy {last_block_energy}"
        );
        // The identified path concentrates on the active tap.
        let tap = filter.taps()[FILTER_LENGTH - 1 - 10];
        assert!((tap - 0.5).abs() < 0.05, "expected ~0.5 at echo tap, got {tap}");
    }

    #[test]
    fn zero_reference_leaves_taps_at_zero() {
        let mut filter = NlmsFilter::new(0.1);
        let window = [0.0f32; ALIGNED_WINDOW_LENGTH];
        let mic = [0.3f32; BLOCK_SIZE];
        let mut error = [0.0f32; BLOCK_SIZE];
        filter.process_block(&window, &mic, &mut error, true);
        assert!(filter.taps().iter().all(|&t| t == 0.0));
        assert_eq!(mic.as_slice(), error.as_slice());
    }

    #[test]
    fn frozen_filter_does_not_adapt() {
        let mut seed = 42u64;
        let reference: Vec<f32> =
            (0..BLOCK_SIZE + ALIGNED_WINDOW_LENGTH).map(|_| lcg_noise(&mut seed)).collect();
        let (window, mic) = echo_block(&reference, 0, 0, 0.5);

        let mut filter = NlmsFilter::new(0.1);
        let mut error = [0.0f32; BLOCK_SIZE];
        filter.process_block(&window, &mic, &mut error, false);
        assert!(filter.taps().iter().all(|&t| t == 0.0));
    }

    #[test]
    fn guard_resets_non_finite_coefficients() {
        let mut filter = NlmsFilter::new(0.1);
        let window = [f32::INFINITY; ALIGNED_WINDOW_LENGTH];
        let mic = [1.0f32; BLOCK_SIZE];
        let mut error = [0.0f32; BLOCK_SIZE];
        let outcome = filter.process_block(&window, &mic, &mut error, true);
        assert!(outcome.diverged);
        assert!(filter.taps().iter().all(|&t| t == 0.0));
    }

    #[test]
    fn taps_stay_finite_on_extreme_reference() {
        let mut filter = NlmsFilter::new(0.05);
        let window = [1e6f32; ALIGNED_WINDOW_LENGTH];
        let mic = [1e6f32; BLOCK_SIZE];
        let mut error = [0.0f32; BLOCK_SIZE];
        for _ in 0..5 {
            filter.process_block(&window, &mic, &mut error, true);
        }
        assert!(filter
            .taps()
            .iter()
            .all(|t| t.is_finite() && t.abs() <= TAP_MAGNITUDE_LIMIT));
    }
}

//! Residual echo suppression and output clipping.
//!
//! The linear filter leaves a residual whenever the echo path estimate is
//! imperfect. During far-end activity the residual is attenuated; when the
//! far end is silent the capture signal passes through so near-end speech is
//! not coloured by a filter that has nothing to subtract.

use crate::common::BLOCK_SIZE;

/// Time-domain residual suppressor.
#[derive(Debug, Clone)]
pub struct ResidualSuppressor {
    suppression: f32,
}

impl ResidualSuppressor {
    pub fn new(suppression: f32) -> Self {
        debug_assert!((0.0..=1.0).contains(&suppression));
        Self { suppression }
    }

    /// Blends the prediction error with the raw capture block and clips the
    /// result to [-1, +1].
    ///
    /// Far-end active:   `y = (1 - s) * e`
    /// Far-end inactive: `y = (1 - s) * e + s * mic`
    ///
    /// With zeroed filter coefficients the inactive branch reduces to
    /// `y = mic`, the pass-through the silent-reference contract requires.
    pub fn process_block(
        &self,
        mic: &[f32],
        error: &[f32],
        far_end_active: bool,
        out: &mut [f32],
    ) {
        debug_assert_eq!(BLOCK_SIZE, mic.len());
        debug_assert_eq!(BLOCK_SIZE, error.len());
        debug_assert_eq!(BLOCK_SIZE, out.len());

        let s = self.suppression;
        for i in 0..BLOCK_SIZE {
            let y = if far_end_active {
                (1.0 - s) * error[i]
            } else {
                (1.0 - s) * error[i] + s * mic[i]
            };
            out[i] = clip(y);
        }
    }
}

/// Clamps a sample to [-1, +1]. Non-finite values (possible for one block
/// while the divergence guard recovers) map to silence.
fn clip(sample: f32) -> f32 {
    if sample.is_finite() {
        sample.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

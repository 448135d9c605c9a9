//! Echo return loss enhancement (ERLE) estimation.
//!
//! Tracks exponentially weighted block energies of the capture input and the
//! processed output and reports their ratio in dB.

use crate::common::{mean_square, ENERGY_FLOOR, ENERGY_SMOOTHING, ERLE_MAX_DB};

/// Fullband ERLE estimator over smoothed block energies.
#[derive(Debug, Clone, Default)]
pub struct ErleEstimator {
    mic_energy: f32,
    out_energy: f32,
}

impl ErleEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one processed capture block into the energy EWMAs.
    pub fn update(&mut self, mic: &[f32], out: &[f32]) {
        let alpha = ENERGY_SMOOTHING;
        self.mic_energy = alpha * self.mic_energy + (1.0 - alpha) * mean_square(mic);
        self.out_energy = alpha * self.out_energy + (1.0 - alpha) * mean_square(out);
    }

    /// Current ERLE in dB, clamped to [0, 40]. A fresh estimator reports 0.
    pub fn erle_db(&self) -> f32 {
        let ratio = self.mic_energy.max(ENERGY_FLOOR) / self.out_energy.max(ENERGY_FLOOR);
        (10.0 * ratio.log10()).clamp(0.0, ERLE_MAX_DB)
    }

    pub fn reset(&mut self) {
        self.mic_energy = 0.0;
        self.out_energy = 0.0;
    }
}

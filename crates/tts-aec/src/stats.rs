//! Session observability.

/// Snapshot of the metrics a session tracks while processing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionStats {
    /// Echo return loss enhancement in dB, clamped to [0, 40].
    pub erle_db: f32,
    /// Delay used for reference alignment in the most recent capture block.
    pub detected_delay_ms: usize,
    /// Times the divergence guard has zeroed the filter coefficients.
    pub divergence_count: u64,
}

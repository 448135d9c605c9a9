//! Fixed-capacity ring of past reference (far-end) samples.
//!
//! Written one block at a time by the render path and read back by the
//! capture path as delay-aligned windows addressed in "samples ago".

use crate::common::{BLOCK_SIZE, RENDER_HISTORY_CAPACITY};

/// Ring buffer over the most recent `RENDER_HISTORY_CAPACITY` reference
/// samples. Samples older than the capacity, or older than anything that has
/// been written, read back as zero.
#[derive(Debug, Clone)]
pub struct RenderHistory {
    data: Vec<f32>,
    /// Index of the next sample to write.
    write: usize,
    /// Total samples written, saturating at the capacity.
    filled: usize,
}

impl RenderHistory {
    pub fn new() -> Self {
        Self {
            data: vec![0.0; RENDER_HISTORY_CAPACITY],
            write: 0,
            filled: 0,
        }
    }

    /// Appends one block of reference samples, evicting the oldest.
    pub fn push_block(&mut self, block: &[f32]) {
        debug_assert_eq!(BLOCK_SIZE, block.len());
        for &sample in block {
            self.data[self.write] = sample;
            self.write = if self.write < self.data.len() - 1 {
                self.write + 1
            } else {
                0
            };
        }
        self.filled = (self.filled + block.len()).min(self.data.len());
    }

    /// Returns the sample written `ago` samples before the most recent one
    /// (`ago == 0` is the most recent sample). Out-of-range lags are zero.
    pub fn at_ago(&self, ago: usize) -> f32 {
        if ago >= self.filled {
            return 0.0;
        }
        let cap = self.data.len();
        self.data[(self.write + cap - 1 - ago) % cap]
    }

    /// Fills `out` with a contiguous window of history ordered oldest-first:
    /// `out[out.len() - 1]` is the sample `newest_lag` samples ago and each
    /// earlier element is one sample older. Lags beyond the recorded past are
    /// zero-filled.
    pub fn fill_window(&self, newest_lag: usize, out: &mut [f32]) {
        let len = out.len();
        for (k, slot) in out.iter_mut().enumerate() {
            *slot = self.at_ago(newest_lag + len - 1 - k);
        }
    }

    /// Zeroes the history.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.write = 0;
        self.filled = 0;
    }
}

impl Default for RenderHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::vec as pvec;
    use proptest::prelude::*;
    use test_strategy::proptest;

    fn block_of(value: f32) -> [f32; BLOCK_SIZE] {
        [value; BLOCK_SIZE]
    }

    #[test]
    fn empty_history_reads_zero() {
        let history = RenderHistory::new();
        assert_eq!(0.0, history.at_ago(0));
        assert_eq!(0.0, history.at_ago(RENDER_HISTORY_CAPACITY * 2));
    }

    #[test]
    fn most_recent_sample_is_lag_zero() {
        let mut history = RenderHistory::new();
        let mut block = block_of(1.0);
        block[BLOCK_SIZE - 1] = 7.0;
        history.push_block(&block);
        assert_eq!(7.0, history.at_ago(0));
        assert_eq!(1.0, history.at_ago(1));
        assert_eq!(1.0, history.at_ago(BLOCK_SIZE - 1));
        // One block written, anything older is zero.
        assert_eq!(0.0, history.at_ago(BLOCK_SIZE));
    }

    #[test]
    fn eviction_after_capacity_blocks() {
        let mut history = RenderHistory::new();
        let num_blocks = RENDER_HISTORY_CAPACITY / BLOCK_SIZE + 2;
        for b in 0..num_blocks {
            history.push_block(&block_of(b as f32));
        }
        // The newest sample belongs to the last block.
        assert_eq!((num_blocks - 1) as f32, history.at_ago(0));
        // A lag past the capacity reads zero even though older blocks existed.
        assert_eq!(0.0, history.at_ago(RENDER_HISTORY_CAPACITY));
    }

    #[test]
    fn window_orientation_is_oldest_first() {
        let mut history = RenderHistory::new();
        let mut block = [0.0f32; BLOCK_SIZE];
        for (i, s) in block.iter_mut().enumerate() {
            *s = i as f32;
        }
        history.push_block(&block);

        let mut window = [0.0f32; 4];
        history.fill_window(0, &mut window);
        assert_eq!(
            [476.0, 477.0, 478.0, 479.0],
            window,
            "newest sample must land at the end of the window"
        );

        history.fill_window(479, &mut window);
        // Window reaches past the first written sample; the prefix is zero.
        assert_eq!([0.0, 0.0, 0.0, 0.0], window);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut history = RenderHistory::new();
        history.push_block(&block_of(3.0));
        history.clear();
        assert_eq!(0.0, history.at_ago(0));
    }

    // -- Property tests --

    #[proptest]
    fn window_matches_per_sample_reads(
        #[strategy(pvec(-1.0f32..1.0, BLOCK_SIZE * 3))] samples: Vec<f32>,
        #[strategy(0usize..2000)] newest_lag: usize,
        #[strategy(1usize..700)] window_len: usize,
    ) {
        let mut history = RenderHistory::new();
        for block in samples.chunks_exact(BLOCK_SIZE) {
            history.push_block(block);
        }
        let mut window = vec![0.0f32; window_len];
        history.fill_window(newest_lag, &mut window);
        for (k, &w) in window.iter().enumerate() {
            let ago = newest_lag + window_len - 1 - k;
            let expected = if ago < samples.len() {
                samples[samples.len() - 1 - ago]
            } else {
                0.0
            };
            prop_assert_eq!(expected, w);
        }
    }

    #[proptest]
    fn lag_addressing_matches_flat_model(
        #[strategy(pvec(-1.0f32..1.0, BLOCK_SIZE * 4))] samples: Vec<f32>,
        #[strategy(0usize..BLOCK_SIZE * 5)] ago: usize,
    ) {
        let mut history = RenderHistory::new();
        for block in samples.chunks_exact(BLOCK_SIZE) {
            history.push_block(block);
        }
        let expected = if ago < samples.len() {
            samples[samples.len() - 1 - ago]
        } else {
            0.0
        };
        prop_assert_eq!(expected, history.at_ago(ago));
    }
}

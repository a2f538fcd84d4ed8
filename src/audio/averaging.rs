/// Clamps the configured highest frequency to the Nyquist limit of the stream.
pub fn clamp_max_freq(configured: u32, sample_rate: u32) -> u32 {
    configured.min(sample_rate / 2)
}

/// 10·log10(v). Zero maps to negative infinity and negative input to NaN;
/// both are written out as-is.
pub fn to_db(v: f64) -> f64 {
    10.0 * v.log10()
}

/// Ring of the last `len` one-second power spectra.
///
/// Only bins `0..max_freq` are kept. Every `len`-th push completes a cycle
/// and yields the per-bin mean for bins `1..max_freq`. The ring is not cleared
/// between cycles; every slot is overwritten before it is read again.
pub struct AveragingWindow {
    spectra: Vec<Vec<f64>>,
    cursor: usize,
    max_freq: usize,
    in_db: bool,
}

impl AveragingWindow {
    /// `len` must be at least 1.
    pub fn new(len: usize, max_freq: usize, in_db: bool) -> Self {
        debug_assert!(len >= 1);
        Self {
            spectra: vec![vec![0.0; max_freq]; len],
            cursor: 0,
            max_freq,
            in_db,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// `spectrum` must hold at least `max_freq` bins.
    pub fn push(&mut self, spectrum: &[f64]) -> Option<Vec<f64>> {
        self.spectra[self.cursor].copy_from_slice(&spectrum[..self.max_freq]);
        self.cursor += 1;
        if self.cursor < self.spectra.len() {
            return None;
        }
        self.cursor = 0;
        Some(self.means())
    }

    fn means(&self) -> Vec<f64> {
        let count = self.spectra.len() as f64;
        (1..self.max_freq)
            .map(|k| {
                let mean = self.spectra.iter().map(|s| s[k]).sum::<f64>() / count;
                if self.in_db {
                    to_db(mean)
                } else {
                    mean
                }
            })
            .collect()
    }
}

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Number of power bins for a real frame of `len` samples: DC through Nyquist.
pub fn bin_count(len: usize) -> usize {
    len / 2 + 1
}

/// Power spectrum of real one-second frames.
///
/// With one second of samples per frame, bin `k` sits at exactly `k` Hz.
/// No window is applied and nothing is normalized by the frame length, so
/// bin 0 of a constant signal is the square of the sample sum.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    power: Vec<f64>,
}

impl SpectrumAnalyzer {
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(len);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            fft,
            buffer: vec![Complex::new(0.0, 0.0); len],
            scratch,
            power: vec![0.0; bin_count(len)],
        }
    }

    /// Computes |X[k]|² for k in 0..=len/2.
    ///
    /// For 0 < k < len/2 this equals the sum of the squared real and
    /// imaginary parts of the conjugate-symmetric pair; the DC and (for even
    /// lengths) Nyquist coefficients are purely real.
    pub fn power_spectrum(&mut self, frame: &[f64]) -> &[f64] {
        debug_assert_eq!(frame.len(), self.buffer.len());
        for (slot, &s) in self.buffer.iter_mut().zip(frame) {
            *slot = Complex::new(s, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (p, c) in self.power.iter_mut().zip(&self.buffer) {
            *p = c.norm_sqr();
        }
        &self.power
    }
}

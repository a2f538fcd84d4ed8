use std::io::Read;

use crate::audio::analysis::SpectrumAnalyzer;
use crate::audio::averaging::{clamp_max_freq, AveragingWindow};
use crate::audio::decode::PcmDecoder;
use crate::audio::header::read_header;
use crate::config::StreamConfig;
use crate::error::Result;
use crate::output::{Clock, CsvLog, WavMirror};
use crate::shutdown::Shutdown;

/// What one stream-processing run got through before its stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub frames: u64,
    pub emissions: u64,
}

/// Header → decode → (mirror) → spectrum → average → CSV, one run per stream.
pub struct StreamProcessor<C: Clock> {
    config: StreamConfig,
    clock: C,
    shutdown: Shutdown,
}

impl<C: Clock> StreamProcessor<C> {
    pub fn new(config: StreamConfig, clock: C, shutdown: Shutdown) -> Self {
        Self {
            config,
            clock,
            shutdown,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Consumes `reader` until it ends, fails, or shutdown is requested.
    ///
    /// All buffers and the WAV handle belong to this call and are released
    /// when it returns. An averaging window that is only partly filled at
    /// end of stream is dropped.
    pub fn run<R: Read>(&self, mut reader: R) -> Result<RunSummary> {
        let format = read_header(&mut reader)?;
        let max_freq = clamp_max_freq(self.config.max_freq, format.sample_rate);
        if max_freq < self.config.max_freq {
            log::warn!(
                "max. frequency {} Hz is above Nyquist, using {} Hz",
                self.config.max_freq,
                max_freq
            );
        }
        log::info!(
            "Stream: {} Hz, {} bit, averaging {} s, bins 1..{} Hz",
            format.sample_rate,
            format.bit_depth.bits(),
            self.config.avg_interval,
            max_freq
        );

        let len = format.sample_rate as usize;
        let mut decoder = PcmDecoder::new(format);
        let mut analyzer = SpectrumAnalyzer::new(len);
        let mut window = AveragingWindow::new(
            self.config.avg_interval as usize,
            max_freq as usize,
            self.config.in_db,
        );
        let csv = CsvLog::new(&self.config.output_dir, max_freq);
        let mut mirror = self
            .config
            .wav
            .then(|| WavMirror::new(&self.config.output_dir, format.sample_rate));

        let mut summary = RunSummary::default();
        while !self.shutdown.is_triggered() {
            let Some(frame) = decoder.next_frame(&mut reader)? else {
                break;
            };
            summary.frames += 1;

            let now = self.clock.now();
            if let Some(mirror) = mirror.as_mut() {
                mirror.write_frame(&now, frame)?;
            }

            let power = analyzer.power_spectrum(frame);
            if let Some(row) = window.push(power) {
                let path = csv.append(&now, &row)?;
                summary.emissions += 1;
                log_row(&path, &row);
            }
        }

        if window.cursor() > 0 {
            log::debug!("discarding {} s of an unfinished averaging window", window.cursor());
        }
        if let Some(mut mirror) = mirror {
            mirror.close()?;
        }
        Ok(summary)
    }
}

fn log_row(path: &std::path::Path, row: &[f64]) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    let peak = row
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .max_by(|a, b| a.1.total_cmp(b.1));
    if let Some((i, v)) = peak {
        log::debug!("{}: strongest bin {} Hz ({:.3})", path.display(), i + 1, v);
    }
}

//! Spectrogram images of the daily CSV logs.

pub mod render;
pub mod table;

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use jiff::civil::Date;
use jiff::tz::TimeZone;
use jiff::Timestamp;
use walkdir::WalkDir;

use crate::cli::PlotArgs;
use crate::error::{MonitorError, Result};

pub use self::table::TimeOfDay;

/// Everything that shapes one image. Defaults match the `plot` subcommand.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotOptions {
    pub out_dir: Option<PathBuf>,
    pub min_time: TimeOfDay,
    pub max_time: TimeOfDay,
    pub min_freq: u32,
    pub max_freq: u32,
    pub aspect_ratio: f64,
    pub freq_dist: u32,
    pub downscale: f64,
    pub db_offset: Option<f64>,
    pub max_db: f64,
    pub scale: f64,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            out_dir: None,
            min_time: TimeOfDay::MIDNIGHT,
            max_time: TimeOfDay::END_OF_DAY,
            min_freq: 0,
            max_freq: 1000,
            aspect_ratio: 2.5,
            freq_dist: 10,
            downscale: 1.0,
            db_offset: None,
            max_db: 40.0,
            scale: 1.0,
        }
    }
}

impl TryFrom<&PlotArgs> for PlotOptions {
    type Error = MonitorError;

    fn try_from(args: &PlotArgs) -> Result<Self> {
        let opts = Self {
            out_dir: args.out_dir.clone(),
            min_time: args.min_time,
            max_time: args.max_time,
            min_freq: args.min_freq,
            max_freq: args.max_freq,
            aspect_ratio: args.aspect_ratio,
            freq_dist: args.freq_dist,
            downscale: args.downscale,
            db_offset: args.db_offset,
            max_db: args.max_db,
            scale: args.scale,
        };
        opts.validate()?;
        Ok(opts)
    }
}

impl PlotOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0) {
            return Err(MonitorError::Config(format!(
                "aspect ratio must be positive, got {}",
                self.aspect_ratio
            )));
        }
        if !(self.max_db.is_finite() && self.max_db > 0.0) {
            return Err(MonitorError::Config(format!(
                "upper dB limit must be positive, got {}",
                self.max_db
            )));
        }
        if self.freq_dist == 0 {
            return Err(MonitorError::Config("frequency tick distance must be at least 1".into()));
        }
        if self.min_freq > self.max_freq {
            return Err(MonitorError::Config(format!(
                "frequency range {}..{} is empty",
                self.min_freq, self.max_freq
            )));
        }
        Ok(())
    }
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// Expands the inputs into the logs to plot. Files are taken as given;
/// directories are searched recursively for `*.csv`, sorted by path, and
/// filtered to files modified on or after local midnight of `newer`.
pub fn collect_logs(inputs: &[PathBuf], newer: Option<Date>) -> Result<Vec<PathBuf>> {
    let since = newer
        .map(|date| date.to_zoned(TimeZone::system()))
        .transpose()
        .map_err(|e| MonitorError::Config(format!("invalid date: {}", e)))?
        .map(|start| start.timestamp());

    let mut logs = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            logs.push(input.clone());
            continue;
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(input) {
            let entry = entry.map_err(|e| MonitorError::Input {
                path: e.path().unwrap_or(input).to_path_buf(),
                source: io::Error::from(e),
            })?;
            if !entry.file_type().is_file() || !has_csv_extension(entry.path()) {
                continue;
            }
            if let Some(since) = since {
                if modified_at(entry.path())? < since {
                    continue;
                }
            }
            found.push(entry.into_path());
        }
        found.sort();
        logs.extend(found);
    }
    Ok(logs)
}

fn modified_at(path: &Path) -> Result<Timestamp> {
    let input_err = |source: io::Error| MonitorError::Input {
        path: path.to_path_buf(),
        source,
    };
    let modified = std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(input_err)?;
    Timestamp::try_from(modified).map_err(|e| input_err(io::Error::other(e)))
}

/// `{stem}.png`, in `out_dir` or next to the log.
pub fn image_path(log: &Path, out_dir: Option<&Path>) -> PathBuf {
    let mut name = OsString::from(log.file_stem().unwrap_or_default());
    name.push(".png");
    match out_dir {
        Some(dir) => dir.join(name),
        None => log.with_file_name(name),
    }
}

/// Renders one log. Returns `None` when nothing is left after the time and
/// frequency cuts, in which case no image is written.
pub fn plot_log(csv_path: &Path, opts: &PlotOptions) -> Result<Option<PathBuf>> {
    let spectrogram = table::read_log(csv_path, opts)?;
    if spectrogram.columns() == 0 || spectrogram.frequencies.is_empty() {
        log::warn!("{}: nothing to plot in the selected range", csv_path.display());
        return Ok(None);
    }
    for mark in &spectrogram.hour_marks {
        log::debug!("{}: column {} starts {}", csv_path.display(), mark.column, mark.label);
    }

    let image = render::downscale(render::render(&spectrogram, opts), opts.downscale);
    let out = image_path(csv_path, opts.out_dir.as_deref());
    image.save(&out).map_err(|source| MonitorError::Image {
        path: out.clone(),
        source,
    })?;
    log::info!(
        "Wrote {} ({}x{}, {} rows, {}..{} Hz)",
        out.display(),
        image.width(),
        image.height(),
        spectrogram.columns(),
        spectrogram.frequencies[0],
        spectrogram.frequencies[spectrogram.frequencies.len() - 1]
    );
    Ok(Some(out))
}

/// Outcome of a batch of logs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlotSummary {
    pub written: usize,
    pub empty: usize,
    pub failed: usize,
}

/// Plots every log, logging failures and carrying on with the next.
pub fn plot_all(logs: &[PathBuf], opts: &PlotOptions) -> PlotSummary {
    let mut summary = PlotSummary::default();
    for csv_path in logs {
        log::info!("Processing {}", csv_path.display());
        match plot_log(csv_path, opts) {
            Ok(Some(_)) => summary.written += 1,
            Ok(None) => summary.empty += 1,
            Err(e) => {
                summary.failed += 1;
                log::error!("{:#}", anyhow::Error::from(e));
            }
        }
    }
    summary
}

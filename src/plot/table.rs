use std::path::Path;
use std::str::FromStr;

use jiff::civil::{DateTime, Time};

use super::PlotOptions;
use crate::error::{MonitorError, Result};

/// Frequencies on either side of a bin that shape its noise floor.
const FLOOR_SPAN: usize = 10;

/// Time of day with minute resolution, `00:00` up to and including `24:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub const MIDNIGHT: Self = Self(0);
    pub const END_OF_DAY: Self = Self(24 * 60);

    fn of(time: Time) -> Self {
        Self(time.hour() as u16 * 60 + time.minute() as u16)
    }

    /// Whether `self` lies in `from..=to`. Equal bounds select the whole day.
    pub fn within(self, from: TimeOfDay, to: TimeOfDay) -> bool {
        from == to || (from <= self && self <= to)
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || format!("`{}` is not a time of day (HH:MM)", s);
        let (hour, minute) = s.split_once(':').ok_or_else(invalid)?;
        let hour: u16 = hour.parse().map_err(|_| invalid())?;
        let minute: u16 = minute.parse().map_err(|_| invalid())?;
        if minute > 59 || hour > 24 || (hour == 24 && minute > 0) {
            return Err(invalid());
        }
        Ok(Self(hour * 60 + minute))
    }
}

/// First row of a new hour, labelled `YYYY-MM-DD HH:MM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourMark {
    pub column: usize,
    pub label: String,
}

/// The part of a log selected for plotting.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    /// Ascending.
    pub frequencies: Vec<u32>,
    pub hour_marks: Vec<HourMark>,
    /// `values[frequency][row]`
    pub values: Vec<Vec<f64>>,
}

impl Spectrogram {
    /// Number of log rows kept.
    pub fn columns(&self) -> usize {
        self.values.first().map_or(0, Vec::len)
    }
}

/// Reads a daily CSV log, keeping the rows inside the time-of-day window and
/// the columns inside the frequency range.
///
/// With a dB offset every value becomes `(v - offset) * scale`. Without one,
/// each frequency's noise floor is subtracted instead (see
/// [`subtract_noise_floor`]). Rows with a bad timestamp or value are skipped
/// with a warning.
pub fn read_log(path: &Path, opts: &PlotOptions) -> Result<Spectrogram> {
    let csv_err = |source: csv::Error| MonitorError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let headers = reader.headers().map_err(csv_err)?.clone();
    let timestamp_col = headers
        .iter()
        .position(|h| h.trim() == "timestamp")
        .ok_or_else(|| MonitorError::invalid_log(path, "no timestamp column"))?;

    let mut columns: Vec<(u32, usize)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| {
            let freq = h.trim().strip_suffix("Hz")?.trim_end().parse().ok()?;
            Some((freq, i))
        })
        .filter(|&(freq, _)| opts.min_freq <= freq && freq <= opts.max_freq)
        .collect();
    columns.sort_unstable();

    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut hour_marks = Vec::new();
    let mut last_hour = None;
    for (n, record) in reader.records().enumerate() {
        let line = n + 2;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                log::warn!("{}:{}: {}", path.display(), line, e);
                continue;
            }
        };

        let stamp = record.get(timestamp_col).unwrap_or_default();
        let stamp = match DateTime::strptime("%Y-%m-%d %H:%M:%S", stamp.trim()) {
            Ok(stamp) => stamp,
            Err(e) => {
                log::warn!("{}:{}: bad timestamp: {}", path.display(), line, e);
                continue;
            }
        };
        if !TimeOfDay::of(stamp.time()).within(opts.min_time, opts.max_time) {
            continue;
        }

        let values: Option<Vec<f64>> = columns
            .iter()
            .map(|&(_, i)| record.get(i)?.trim().parse().ok())
            .collect();
        let Some(mut values) = values else {
            log::warn!("{}:{}: missing or unreadable value", path.display(), line);
            continue;
        };
        if let Some(offset) = opts.db_offset {
            for v in &mut values {
                *v = (*v - offset) * opts.scale;
            }
        }

        if last_hour != Some(stamp.hour()) {
            last_hour = Some(stamp.hour());
            hour_marks.push(HourMark {
                column: rows.len(),
                label: stamp.strftime("%Y-%m-%d %H:%M").to_string(),
            });
        }
        rows.push(values);
    }

    let mut values: Vec<Vec<f64>> = (0..columns.len())
        .map(|f| rows.iter().map(|row| row[f]).collect())
        .collect();
    if opts.db_offset.is_none() && !rows.is_empty() {
        subtract_noise_floor(&mut values, opts.scale);
    }

    Ok(Spectrogram {
        frequencies: columns.into_iter().map(|(freq, _)| freq).collect(),
        hour_marks,
        values,
    })
}

/// Shifts every frequency by a smoothed noise floor, then scales.
///
/// A frequency's floor is its lowest value over the day. The floors are
/// first replaced by the lowest floor among the frequencies `i-10..i+10`,
/// then by the mean of those minima over the same range, so a single quiet
/// bin does not carve a stripe into the image.
pub fn subtract_noise_floor(values: &mut [Vec<f64>], scale: f64) {
    let count = values.len();
    let span = |i: usize| i.saturating_sub(FLOOR_SPAN)..(i + FLOOR_SPAN).min(count);
    let lowest = |xs: &[f64]| xs.iter().copied().fold(f64::INFINITY, f64::min);

    let floors: Vec<f64> = values.iter().map(|series| lowest(series)).collect();
    let minima: Vec<f64> = (0..count).map(|i| lowest(&floors[span(i)])).collect();
    let envelope: Vec<f64> = (0..count)
        .map(|i| {
            let near = &minima[span(i)];
            near.iter().sum::<f64>() / near.len() as f64
        })
        .collect();

    for (series, floor) in values.iter_mut().zip(envelope) {
        for v in series {
            *v = (*v - floor) * scale;
        }
    }
}

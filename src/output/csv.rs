use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use jiff::Zoned;

use super::dated_path;
use crate::error::{MonitorError, Result};

/// Daily CSV files of averaged spectra, one row per completed window.
///
/// The file is opened, appended to and closed on every row.
pub struct CsvLog {
    dir: PathBuf,
    max_freq: u32,
}

impl CsvLog {
    /// `max_freq` is the already clamped limit; rows carry `max_freq - 1` values.
    pub fn new(dir: impl Into<PathBuf>, max_freq: u32) -> Self {
        Self {
            dir: dir.into(),
            max_freq,
        }
    }

    /// Appends one row stamped with `now` to that day's file, creating the
    /// file with its header row first if it does not exist yet.
    pub fn append(&self, now: &Zoned, values: &[f64]) -> Result<PathBuf> {
        let path = dated_path(&self.dir, now, "csv");
        let (file, created) = open_for_append(&path).map_err(|e| MonitorError::write(&path, e))?;
        if created {
            log::info!("Created {}", path.display());
        }

        let mut writer = ::csv::WriterBuilder::new().from_writer(file);
        if created {
            writer
                .write_record(header_row(self.max_freq))
                .map_err(|e| MonitorError::write(&path, e))?;
        }
        writer
            .write_record(data_row(now, values))
            .map_err(|e| MonitorError::write(&path, e))?;
        writer.flush().map_err(|e| MonitorError::write(&path, e))?;

        Ok(path)
    }
}

/// Opens `path` for appending. The flag is true only when this call created
/// the file, so a file that already exists never gets a second header.
fn open_for_append(path: &Path) -> io::Result<(File, bool)> {
    match OpenOptions::new().append(true).create_new(true).open(path) {
        Ok(file) => Ok((file, true)),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            let file = OpenOptions::new().append(true).open(path)?;
            Ok((file, false))
        }
        Err(e) => Err(e),
    }
}

pub fn header_row(max_freq: u32) -> Vec<String> {
    std::iter::once("timestamp".to_string())
        .chain((1..max_freq).map(|hz| format!("{} Hz", hz)))
        .collect()
}

pub fn data_row(now: &Zoned, values: &[f64]) -> Vec<String> {
    std::iter::once(now.strftime("%Y-%m-%d %H:%M:%S").to_string())
        .chain(values.iter().map(|v| format!("{:.3}", v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::local_time;
    use tempfile::TempDir;

    fn lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn header_written_once_per_file() {
        let dir = TempDir::new().unwrap();
        let log = CsvLog::new(dir.path(), 5);

        let first = log.append(&local_time(2024, 5, 1, 10, 0, 0), &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let second = log.append(&local_time(2024, 5, 1, 10, 1, 0), &[0.5, 0.25, 0.125, 0.0626]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, dir.path().join("2024-05-01_out.csv"));

        let lines = lines(&first);
        assert_eq!(
            lines,
            vec![
                "timestamp,1 Hz,2 Hz,3 Hz,4 Hz",
                "2024-05-01 10:00:00,1.000,2.000,3.000,4.000",
                "2024-05-01 10:01:00,0.500,0.250,0.125,0.063",
            ]
        );
        for line in &lines {
            assert_eq!(line.split(',').count(), 5);
        }
    }

    #[test]
    fn existing_file_is_appended_without_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("2024-05-01_out.csv");
        std::fs::write(&path, "timestamp,1 Hz,2 Hz\n2024-05-01 09:00:00,1.000,1.000\n").unwrap();

        // a second run with a fresh logger must not re-head the file
        let log = CsvLog::new(dir.path(), 3);
        log.append(&local_time(2024, 5, 1, 9, 1, 0), &[2.0, 2.0]).unwrap();

        let lines = lines(&path);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines.iter().filter(|l| l.starts_with("timestamp")).count(), 1);
        assert_eq!(lines[2], "2024-05-01 09:01:00,2.000,2.000");
    }

    #[test]
    fn new_day_gets_new_file() {
        let dir = TempDir::new().unwrap();
        let log = CsvLog::new(dir.path(), 2);
        let a = log.append(&local_time(2024, 5, 1, 23, 59, 30), &[1.0]).unwrap();
        let b = log.append(&local_time(2024, 5, 2, 0, 0, 30), &[1.0]).unwrap();
        assert_ne!(a, b);
        assert_eq!(lines(&b)[0], "timestamp,1 Hz");
        assert_eq!(lines(&b).len(), 2);
    }

    #[test]
    fn non_finite_values_do_not_fail() {
        let row = data_row(&local_time(2024, 1, 2, 3, 4, 5), &[f64::NEG_INFINITY, -12.3456]);
        assert_eq!(row, vec!["2024-01-02 03:04:05", "-inf", "-12.346"]);
    }

    #[test]
    fn missing_directory_is_a_write_error() {
        let dir = TempDir::new().unwrap();
        let log = CsvLog::new(dir.path().join("nope"), 3);
        let err = log.append(&local_time(2024, 1, 1, 0, 0, 0), &[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, MonitorError::Write { .. }));
    }
}

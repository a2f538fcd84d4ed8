pub mod csv;
pub mod wav;

use std::path::{Path, PathBuf};

use jiff::Zoned;

pub use self::csv::CsvLog;
pub use self::wav::WavMirror;

/// Suffix shared by every file this tool writes: `{date}_out.{ext}`.
pub const OUTPUT_MARKER: &str = "out";

/// Source of local wall-clock time.
pub trait Clock {
    fn now(&self) -> Zoned;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Zoned {
        Zoned::now()
    }
}

/// `{dir}/{YYYY-MM-DD}_out.{ext}` for the local calendar date of `now`.
pub fn dated_path(dir: &Path, now: &Zoned, ext: &str) -> PathBuf {
    dir.join(format!(
        "{}_{}.{}",
        now.strftime("%Y-%m-%d"),
        OUTPUT_MARKER,
        ext
    ))
}

#[cfg(test)]
pub(crate) fn local_time(year: i16, month: i8, day: i8, hour: i8, minute: i8, second: i8) -> Zoned {
    jiff::civil::date(year, month, day)
        .at(hour, minute, second, 0)
        .to_zoned(jiff::tz::TimeZone::UTC)
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_uses_zero_padded_local_date() {
        let now = local_time(2024, 3, 7, 23, 59, 59);
        assert_eq!(
            dated_path(Path::new("/var/log/noise"), &now, "csv"),
            PathBuf::from("/var/log/noise/2024-03-07_out.csv")
        );
        assert_eq!(
            dated_path(Path::new("."), &now, "wav"),
            PathBuf::from("./2024-03-07_out.wav")
        );
    }
}

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use jiff::{civil::Date, Zoned};

use super::dated_path;
use crate::audio::header::{WavHeader, HEADER_LEN};
use crate::error::{MonitorError, Result};

/// WAVE_FORMAT_IEEE_FLOAT
const IEEE_FLOAT: u16 = 3;
const BITS_PER_SAMPLE: u16 = 64;
const BYTES_PER_SAMPLE: u64 = BITS_PER_SAMPLE as u64 / 8;

/// Canonical 44-byte header of a mono 64-bit float file holding `data_len`
/// bytes of samples. Sizes that do not fit 32 bits are pinned at `u32::MAX`.
fn float_header(sample_rate: u32, data_len: u64) -> Vec<u8> {
    let block_align = BITS_PER_SAMPLE / 8;
    let byte_rate = sample_rate.saturating_mul(block_align as u32);
    let data_size = u32::try_from(data_len).unwrap_or(u32::MAX);
    let riff_size = u32::try_from(data_len + 36).unwrap_or(u32::MAX);

    let mut out = Vec::with_capacity(HEADER_LEN);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_size.to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&IEEE_FLOAT.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());
    out
}

fn is_mono_f64(header: &WavHeader) -> bool {
    &header.chunk_id == b"RIFF"
        && &header.format == b"WAVE"
        && &header.subchunk1_id == b"fmt "
        && header.subchunk1_size == 16
        && header.audio_format == IEEE_FLOAT
        && header.num_channels == 1
        && header.bits_per_sample == BITS_PER_SAMPLE
        && header.block_align == BITS_PER_SAMPLE / 8
        && header.byte_rate == header.sample_rate.saturating_mul(8)
        && &header.subchunk2_id == b"data"
}

/// A mono 64-bit float WAV file open for appending.
struct FloatWavFile {
    path: PathBuf,
    writer: BufWriter<File>,
    data_len: u64,
}

impl FloatWavFile {
    /// Creates `path` with an empty data chunk, or returns `None` if it
    /// already exists.
    fn create(path: &Path, sample_rate: u32) -> Result<Option<Self>> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(MonitorError::wav(path, e)),
        };
        file.write_all(&float_header(sample_rate, 0))
            .map_err(|e| MonitorError::wav(path, e))?;
        Ok(Some(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            data_len: 0,
        }))
    }

    /// Opens an existing mirror file and positions after its last whole
    /// sample. The data length comes from the file size, so a file whose
    /// header was not updated before a crash is still extended correctly.
    fn append(path: &Path, sample_rate: u32) -> Result<Self> {
        let wav_err = |e: io::Error| MonitorError::wav(path, e);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(wav_err)?;

        let mut bytes = [0u8; HEADER_LEN];
        let header = match file.read_exact(&mut bytes) {
            Ok(()) => Some(WavHeader::from_bytes(&bytes)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => None,
            Err(e) => return Err(wav_err(e)),
        };
        let Some(header) = header.filter(is_mono_f64) else {
            return Err(MonitorError::write(
                path,
                io::Error::new(io::ErrorKind::InvalidData, "not a mono 64-bit float wav file"),
            ));
        };
        if header.sample_rate != sample_rate {
            log::warn!(
                "{} was recorded at {} Hz, appending {} Hz audio",
                path.display(),
                header.sample_rate,
                sample_rate
            );
        }

        let file_len = file.metadata().map_err(wav_err)?.len();
        let data_len = (file_len - HEADER_LEN as u64) / BYTES_PER_SAMPLE * BYTES_PER_SAMPLE;
        if HEADER_LEN as u64 + data_len != file_len {
            log::warn!("{}: dropping a torn trailing sample", path.display());
            file.set_len(HEADER_LEN as u64 + data_len).map_err(wav_err)?;
        }
        file.seek(SeekFrom::End(0)).map_err(wav_err)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            data_len,
        })
    }

    fn write_samples(&mut self, samples: &[f64]) -> io::Result<()> {
        for s in samples {
            self.writer.write_all(&s.to_le_bytes())?;
        }
        self.data_len += samples.len() as u64 * BYTES_PER_SAMPLE;
        Ok(())
    }

    /// Writes out buffered samples and patches both size fields.
    fn flush(&mut self) -> io::Result<()> {
        let data_size = u32::try_from(self.data_len).unwrap_or(u32::MAX);
        let riff_size = u32::try_from(self.data_len + 36).unwrap_or(u32::MAX);
        self.writer.seek(SeekFrom::Start(4))?;
        self.writer.write_all(&riff_size.to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(40))?;
        self.writer.write_all(&data_size.to_le_bytes())?;
        self.writer.seek(SeekFrom::End(0))?;
        self.writer.flush()
    }
}

struct OpenMirror {
    date: Date,
    file: FloatWavFile,
}

impl OpenMirror {
    fn finalize(mut self) -> Result<()> {
        self.file
            .flush()
            .map_err(|e| MonitorError::wav(&self.file.path, e))?;
        log::debug!("Closed {}", self.file.path.display());
        Ok(())
    }
}

/// Daily WAV copy of the analyzed audio, mono 64-bit IEEE float.
///
/// One file handle is held for the current date. It is finalized and swapped
/// the first time a frame arrives with a later date, and on drop. A file
/// removed while open is recreated on the next frame.
pub struct WavMirror {
    dir: PathBuf,
    sample_rate: u32,
    current: Option<OpenMirror>,
}

impl WavMirror {
    pub fn new(dir: impl Into<PathBuf>, sample_rate: u32) -> Self {
        Self {
            dir: dir.into(),
            sample_rate,
            current: None,
        }
    }

    pub fn write_frame(&mut self, now: &Zoned, samples: &[f64]) -> Result<()> {
        let date = now.date();
        let mut mirror = match self.current.take() {
            Some(open) if open.date == date && open.file.path.exists() => open,
            stale => {
                if let Some(old) = stale {
                    if old.date == date {
                        log::warn!("{} disappeared, recreating it", old.file.path.display());
                    }
                    old.finalize()?;
                }
                self.open(now)?
            }
        };

        mirror
            .file
            .write_samples(samples)
            .map_err(|e| MonitorError::wav(&mirror.file.path, e))?;
        // keeps the header's data length current so a crash leaves an appendable file
        mirror
            .file
            .flush()
            .map_err(|e| MonitorError::wav(&mirror.file.path, e))?;

        self.current = Some(mirror);
        Ok(())
    }

    fn open(&self, now: &Zoned) -> Result<OpenMirror> {
        let path = dated_path(&self.dir, now, "wav");
        let file = match FloatWavFile::create(&path, self.sample_rate)? {
            Some(file) => {
                log::info!("Created {} ({} Hz)", path.display(), self.sample_rate);
                file
            }
            None => {
                let file = FloatWavFile::append(&path, self.sample_rate)?;
                log::info!("Appending to {}", path.display());
                file
            }
        };

        Ok(OpenMirror {
            date: now.date(),
            file,
        })
    }

    pub fn close(&mut self) -> Result<()> {
        match self.current.take() {
            Some(open) => open.finalize(),
            None => Ok(()),
        }
    }
}

impl Drop for WavMirror {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close wav mirror: {:#}", anyhow::Error::from(e));
        }
    }
}

/// Header and samples of a mirror file as written to disk.
#[cfg(test)]
pub(crate) fn read_mirror(path: &Path) -> (WavHeader, u32, Vec<f64>) {
    let bytes = std::fs::read(path).unwrap();
    let head: [u8; HEADER_LEN] = bytes[..HEADER_LEN].try_into().unwrap();
    let data_size = u32::from_le_bytes(bytes[40..44].try_into().unwrap());
    let samples = bytes[HEADER_LEN..]
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
        .collect();
    (WavHeader::from_bytes(&head), data_size, samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::header::encode_header;
    use crate::output::local_time;

    fn ramp(len: usize) -> Vec<f64> {
        (0..len).map(|i| i as f64 / len as f64 - 0.5).collect()
    }

    #[test]
    fn creates_double_precision_file_at_stream_rate() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut mirror = WavMirror::new(dir.path(), 100);
        let now = local_time(2024, 6, 1, 12, 0, 0);
        mirror.write_frame(&now, &ramp(100)).unwrap();
        mirror.write_frame(&now, &ramp(100)).unwrap();
        mirror.close().unwrap();

        let (header, data_size, samples) = read_mirror(&dir.path().join("2024-06-01_out.wav"));
        assert_eq!(header.audio_format, IEEE_FLOAT);
        assert_eq!(header.bits_per_sample, 64);
        assert_eq!(header.num_channels, 1);
        assert_eq!(header.sample_rate, 100);
        assert_eq!(header.byte_rate, 800);
        assert_eq!(header.block_align, 8);
        assert_eq!(data_size, 200 * 8);
        assert_eq!(samples.len(), 200);
        assert_eq!(samples[0], -0.5);
        assert_eq!(samples[150], 0.0);
        // no rounding through single precision
        assert_eq!(samples[1], 1.0 / 100.0 - 0.5);
    }

    #[test]
    fn header_is_current_after_every_frame() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut mirror = WavMirror::new(dir.path(), 10);
        mirror.write_frame(&local_time(2024, 6, 1, 12, 0, 0), &ramp(10)).unwrap();

        let (_, data_size, samples) = read_mirror(&dir.path().join("2024-06-01_out.wav"));
        assert_eq!(data_size, 80);
        assert_eq!(samples.len(), 10);
    }

    #[test]
    fn later_run_appends_to_same_day() {
        let dir = tempfile::TempDir::new().unwrap();
        let now = local_time(2024, 6, 1, 12, 0, 0);
        {
            let mut first_run = WavMirror::new(dir.path(), 50);
            first_run.write_frame(&now, &ramp(50)).unwrap();
        }
        {
            let mut second_run = WavMirror::new(dir.path(), 50);
            second_run.write_frame(&now, &ramp(50)).unwrap();
            second_run.write_frame(&now, &ramp(50)).unwrap();
        }

        let (header, data_size, samples) = read_mirror(&dir.path().join("2024-06-01_out.wav"));
        assert_eq!(header.sample_rate, 50);
        assert_eq!(data_size, 150 * 8);
        assert_eq!(samples.len(), 150);
    }

    #[test]
    fn torn_sample_is_dropped_before_appending() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("2024-06-01_out.wav");
        let now = local_time(2024, 6, 1, 12, 0, 0);
        WavMirror::new(dir.path(), 4).write_frame(&now, &ramp(4)).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0xAB; 3]).unwrap();
        drop(file);

        WavMirror::new(dir.path(), 4).write_frame(&now, &[0.25; 4]).unwrap();
        let (_, data_size, samples) = read_mirror(&path);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 44 + 8 * 8);
        assert_eq!(data_size, 64);
        assert_eq!(samples[..4], ramp(4)[..]);
        assert_eq!(samples[4..], [0.25; 4]);
    }

    #[test]
    fn switches_file_at_midnight() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut mirror = WavMirror::new(dir.path(), 10);
        mirror.write_frame(&local_time(2024, 6, 1, 23, 59, 59), &ramp(10)).unwrap();
        mirror.write_frame(&local_time(2024, 6, 2, 0, 0, 0), &ramp(10)).unwrap();
        mirror.write_frame(&local_time(2024, 6, 2, 0, 0, 1), &ramp(10)).unwrap();
        drop(mirror);

        let (_, _, day_one) = read_mirror(&dir.path().join("2024-06-01_out.wav"));
        let (_, _, day_two) = read_mirror(&dir.path().join("2024-06-02_out.wav"));
        assert_eq!(day_one.len(), 10);
        assert_eq!(day_two.len(), 20);
    }

    #[cfg(unix)]
    #[test]
    fn file_removed_mid_day_is_recreated() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("2024-06-01_out.wav");
        let mut mirror = WavMirror::new(dir.path(), 10);
        mirror.write_frame(&local_time(2024, 6, 1, 9, 0, 0), &ramp(10)).unwrap();
        std::fs::remove_file(&path).unwrap();

        mirror.write_frame(&local_time(2024, 6, 1, 9, 0, 1), &[0.5; 10]).unwrap();
        mirror.close().unwrap();

        let (header, data_size, samples) = read_mirror(&path);
        assert_eq!(header.bits_per_sample, 64);
        assert_eq!(data_size, 80);
        assert_eq!(samples, vec![0.5; 10]);
    }

    #[test]
    fn refuses_to_append_to_foreign_format() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("2024-06-01_out.wav");
        let mut pcm = encode_header(8000, 16, 1, 1);
        pcm.extend_from_slice(&[0, 0]);
        std::fs::write(&path, &pcm).unwrap();

        let mut mirror = WavMirror::new(dir.path(), 8000);
        let err = mirror
            .write_frame(&local_time(2024, 6, 1, 8, 0, 0), &[0.0; 8000])
            .unwrap_err();
        assert!(matches!(err, MonitorError::Write { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), pcm);
    }

    #[test]
    fn refuses_to_append_to_truncated_header() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("2024-06-01_out.wav"), b"RIFF").unwrap();

        let mut mirror = WavMirror::new(dir.path(), 8000);
        let err = mirror
            .write_frame(&local_time(2024, 6, 1, 8, 0, 0), &[0.0; 8])
            .unwrap_err();
        assert!(matches!(err, MonitorError::Write { .. }));
    }
}

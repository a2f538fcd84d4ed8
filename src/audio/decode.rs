use std::io::{self, Read};

use super::header::{BitDepth, StreamFormat};
use crate::error::{MonitorError, Result};

/// Turns a raw PCM stream into one-second frames of normalized samples.
///
/// Both buffers are sized once from the validated header and reused for
/// every frame of the run.
pub struct PcmDecoder {
    format: StreamFormat,
    raw: Vec<u8>,
    samples: Vec<f64>,
}

impl PcmDecoder {
    pub fn new(format: StreamFormat) -> Self {
        Self {
            format,
            raw: vec![0u8; format.bytes_per_second()],
            samples: vec![0.0; format.sample_rate as usize],
        }
    }

    /// Reads and decodes the next second of audio.
    ///
    /// Returns `Ok(None)` when the stream ends, including mid-frame: a
    /// partial second is dropped rather than padded.
    pub fn next_frame<R: Read>(&mut self, reader: &mut R) -> Result<Option<&[f64]>> {
        match reader.read_exact(&mut self.raw) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(MonitorError::Read(e)),
        }
        decode_into(&self.raw, self.format.bit_depth, &mut self.samples);
        Ok(Some(&self.samples))
    }
}

/// Decodes `raw` into `out`, one sample per output slot.
///
/// 8-bit samples are taken as unsigned byte values, 16-bit samples as signed
/// little-endian; both are divided by 2^(bits - 1).
pub fn decode_into(raw: &[u8], depth: BitDepth, out: &mut [f64]) {
    let scale = depth.full_scale();
    match depth {
        BitDepth::Eight => {
            for (sample, &byte) in out.iter_mut().zip(raw) {
                *sample = byte as f64 / scale;
            }
        }
        BitDepth::Sixteen => {
            for (sample, pair) in out.iter_mut().zip(raw.chunks_exact(2)) {
                *sample = i16::from_le_bytes([pair[0], pair[1]]) as f64 / scale;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn format(sample_rate: u32, bit_depth: BitDepth) -> StreamFormat {
        StreamFormat {
            sample_rate,
            bit_depth,
        }
    }

    #[test]
    fn sixteen_bit_is_signed_little_endian() {
        let values: [i16; 4] = [0, 1, -1, i16::MIN];
        let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut out = [0.0; 4];
        decode_into(&raw, BitDepth::Sixteen, &mut out);
        for (got, v) in out.iter().zip(values) {
            assert_eq!(*got, v as f64 / 32768.0);
        }
        assert_eq!(out[3], -1.0);
    }

    #[test]
    fn eight_bit_is_unsigned_over_128() {
        let raw = [0u8, 64, 128, 255];
        let mut out = [0.0; 4];
        decode_into(&raw, BitDepth::Eight, &mut out);
        assert_eq!(out, [0.0, 0.5, 1.0, 255.0 / 128.0]);
    }

    #[test]
    fn yields_whole_seconds_then_ends() {
        // two full seconds plus half a second at 4 Hz, 16 bit
        let raw: Vec<u8> = (0..10i16).flat_map(|v| (v * 100).to_le_bytes()).collect();
        let mut reader = Cursor::new(raw);
        let mut decoder = PcmDecoder::new(format(4, BitDepth::Sixteen));

        let first = decoder.next_frame(&mut reader).unwrap().unwrap().to_vec();
        assert_eq!(first.len(), 4);
        assert_eq!(first[1], 100.0 / 32768.0);

        let second = decoder.next_frame(&mut reader).unwrap().unwrap().to_vec();
        assert_eq!(second[0], 400.0 / 32768.0);

        assert!(decoder.next_frame(&mut reader).unwrap().is_none());
    }

    struct BrokenPipe;

    impl Read for BrokenPipe {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
    }

    #[test]
    fn read_failure_is_an_error() {
        let mut decoder = PcmDecoder::new(format(8, BitDepth::Eight));
        assert!(matches!(
            decoder.next_frame(&mut BrokenPipe),
            Err(MonitorError::Read(_))
        ));
    }
}

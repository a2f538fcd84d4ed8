use std::io::{self, Read};

use crate::error::{MonitorError, Result};

/// Size of the canonical 44-byte RIFF/WAVE header that precedes the PCM data.
pub const HEADER_LEN: usize = 44;

/// Bit depths the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Eight,
    Sixteen,
}

impl BitDepth {
    pub fn bits(self) -> u16 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        self.bits() as usize / 8
    }

    /// 2^(bits - 1)
    pub fn full_scale(self) -> f64 {
        (1u32 << (self.bits() - 1)) as f64
    }
}

/// What a validated header tells the rest of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub bit_depth: BitDepth,
}

impl StreamFormat {
    pub fn bytes_per_second(&self) -> usize {
        self.bit_depth.bytes_per_sample() * self.sample_rate as usize
    }
}

/// The fields of the canonical header this tool looks at. The RIFF and data
/// sizes are skipped: live recorders write placeholders there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub chunk_id: [u8; 4],
    pub format: [u8; 4],
    pub subchunk1_id: [u8; 4],
    pub subchunk1_size: u32,
    pub audio_format: u16,
    pub num_channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub subchunk2_id: [u8; 4],
}

fn tag(bytes: &[u8; HEADER_LEN], at: usize) -> [u8; 4] {
    [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]
}

fn le_u16(bytes: &[u8; HEADER_LEN], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn le_u32(bytes: &[u8; HEADER_LEN], at: usize) -> u32 {
    u32::from_le_bytes(tag(bytes, at))
}

impl WavHeader {
    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Self {
        Self {
            chunk_id: tag(bytes, 0),
            format: tag(bytes, 8),
            subchunk1_id: tag(bytes, 12),
            subchunk1_size: le_u32(bytes, 16),
            audio_format: le_u16(bytes, 20),
            num_channels: le_u16(bytes, 22),
            sample_rate: le_u32(bytes, 24),
            byte_rate: le_u32(bytes, 28),
            block_align: le_u16(bytes, 32),
            bits_per_sample: le_u16(bytes, 34),
            subchunk2_id: tag(bytes, 36),
        }
    }

    /// Checks the header against the subset of WAV this tool accepts:
    /// uncompressed PCM, mono, 8 or 16 bits per sample.
    ///
    /// The data subchunk id and the size fields are not checked; live
    /// recorders write placeholder values there.
    pub fn validate(&self) -> Result<StreamFormat> {
        if &self.chunk_id != b"RIFF" {
            return Err(MonitorError::Format("missing RIFF tag".into()));
        }
        if &self.format != b"WAVE" {
            return Err(MonitorError::Format("missing WAVE tag".into()));
        }
        if &self.subchunk1_id != b"fmt " {
            return Err(MonitorError::Format("missing fmt chunk".into()));
        }
        if self.subchunk1_size != 16 {
            return Err(MonitorError::Format(format!(
                "fmt chunk size is {}, expected 16",
                self.subchunk1_size
            )));
        }
        if self.audio_format != 1 {
            return Err(MonitorError::Format(
                "compressed wave file format unsupported".into(),
            ));
        }
        if self.num_channels != 1 {
            return Err(MonitorError::Format("only MONO supported".into()));
        }
        let bit_depth = match self.bits_per_sample {
            8 => BitDepth::Eight,
            16 => BitDepth::Sixteen,
            _ => {
                return Err(MonitorError::Format(
                    "only 8 or 16 bit samples supported".into(),
                ))
            }
        };
        if self.sample_rate == 0 {
            return Err(MonitorError::Format("sample rate is zero".into()));
        }

        Ok(StreamFormat {
            sample_rate: self.sample_rate,
            bit_depth,
        })
    }
}

/// Reads and validates the header at the start of a stream.
///
/// A stream that ends before all 44 bytes arrive is rejected as a format
/// error; any other I/O failure is a read error.
pub fn read_header<R: Read>(reader: &mut R) -> Result<StreamFormat> {
    let mut bytes = [0u8; HEADER_LEN];
    match reader.read_exact(&mut bytes) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(MonitorError::Format(format!(
                "stream ended before the {}-byte header was complete",
                HEADER_LEN
            )));
        }
        Err(e) => return Err(MonitorError::Read(e)),
    }
    let header = WavHeader::from_bytes(&bytes);
    log::debug!(
        "header: {} bytes/s, block align {}",
        header.byte_rate,
        header.block_align
    );
    header.validate()
}

/// Builds a header the way `arecord` writes one for an open-ended stream.
#[cfg(test)]
pub fn encode_header(sample_rate: u32, bits: u16, channels: u16, audio_format: u16) -> Vec<u8> {
    let block_align = channels * bits / 8;
    let byte_rate = sample_rate * block_align as u32;
    let mut out = Vec::with_capacity(HEADER_LEN);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&u32::MAX.to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&audio_format.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&u32::MAX.to_le_bytes());
    out
}

use std::io::{self, Read, Write};

use base64::alphabet;
use base64::engine::general_purpose::URL_SAFE;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use flate2::{Compression, GzBuilder};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::detect::MAGIC_PREFIXES;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const GZIP_OS_UNIX: u8 = 3;

/// Accepts both alphabets (standard input is mapped onto URL-safe first) and
/// any padding.
const LENIENT_URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    pub initial_capacity_hint: usize,
    pub max_attempts: u32,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            initial_capacity_hint: 64 * 1024,
            max_attempts: 12,
        }
    }
}

impl DecodeConfig {
    fn first_capacity(&self, compressed_len: usize) -> usize {
        compressed_len
            .saturating_mul(4)
            .max(self.initial_capacity_hint)
            .max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("level payload is not valid encoded text: {message}")]
    InvalidEncoding { message: String },
    #[error("inflating level payload produced no output after {attempts} attempt(s)")]
    InflateFailed { attempts: u32 },
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to compress level string: {0}")]
    Compress(#[source] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamFraming {
    Gzip,
    Zlib,
    RawDeflate,
}

impl StreamFraming {
    fn sniff(compressed: &[u8]) -> &'static [StreamFraming] {
        if compressed.starts_with(&GZIP_MAGIC) {
            &[StreamFraming::Gzip]
        } else if looks_like_zlib_header(compressed) {
            &[StreamFraming::Zlib, StreamFraming::RawDeflate]
        } else {
            &[StreamFraming::RawDeflate]
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Decompressor {
    config: DecodeConfig,
}

impl Decompressor {
    pub fn new(config: DecodeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    pub fn decode(&self, payload: &[u8]) -> Result<String, DecodeError> {
        let trimmed = payload.trim_ascii();
        let mut inflate_attempts = 0u32;
        let mut decoded_any = false;
        let mut encoding_error = None::<String>;

        for candidate in candidate_streams(trimmed) {
            let compressed = match decode_base64(candidate) {
                Ok(bytes) => bytes,
                Err(message) => {
                    encoding_error.get_or_insert(message);
                    continue;
                }
            };
            decoded_any = true;

            match self.inflate(&compressed) {
                Ok(inflated) => return text_from_bytes(inflated),
                Err(attempts) => inflate_attempts = inflate_attempts.saturating_add(attempts),
            }
        }

        if decoded_any {
            Err(DecodeError::InflateFailed {
                attempts: inflate_attempts,
            })
        } else {
            Err(DecodeError::InvalidEncoding {
                message: encoding_error.unwrap_or_else(|| "empty payload".to_string()),
            })
        }
    }

    /// Returns the number of attempts spent when no framing produced output.
    fn inflate(&self, compressed: &[u8]) -> Result<Vec<u8>, u32> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut spent = 0u32;

        for &framing in StreamFraming::sniff(compressed) {
            let mut capacity = self.config.first_capacity(compressed.len());
            for attempt in 1..=max_attempts {
                spent = spent.saturating_add(1);
                match inflate_bounded(framing, compressed, capacity) {
                    Ok(bytes) if bytes.len() < capacity && !bytes.is_empty() => {
                        debug!(
                            framing = ?framing,
                            attempt,
                            capacity,
                            inflated_len = bytes.len(),
                            "level_payload_inflated"
                        );
                        return Ok(bytes);
                    }
                    Ok(bytes) if bytes.len() < capacity => {
                        debug!(framing = ?framing, attempt, "inflate_empty_output");
                        break;
                    }
                    Ok(_) => {
                        debug!(framing = ?framing, attempt, capacity, "inflate_capacity_exhausted");
                        capacity = capacity.saturating_mul(2);
                    }
                    Err(error) => {
                        debug!(framing = ?framing, attempt, error = %error, "inflate_stream_error");
                        break;
                    }
                }
            }
        }

        Err(spent)
    }
}

pub fn decode_level_string(payload: &[u8]) -> Result<String, DecodeError> {
    Decompressor::default().decode(payload)
}

/// Encodes plain level text as URL-safe base64 of a gzip stream, the form
/// [`decode_level_string`] reads back.
pub fn encode_level_string(text: &str) -> Result<String, EncodeError> {
    let mut encoder = GzBuilder::new()
        .operating_system(GZIP_OS_UNIX)
        .write(Vec::new(), Compression::default());
    encoder
        .write_all(text.as_bytes())
        .map_err(EncodeError::Compress)?;
    let compressed = encoder.finish().map_err(EncodeError::Compress)?;
    Ok(URL_SAFE.encode(compressed))
}

fn candidate_streams(payload: &[u8]) -> Vec<&[u8]> {
    let mut candidates = vec![payload];
    for prefix in MAGIC_PREFIXES {
        if let Some(rest) = payload.strip_prefix(prefix.as_bytes()) {
            candidates.push(rest);
        }
    }
    candidates
}

fn decode_base64(text: &[u8]) -> Result<Vec<u8>, String> {
    let normalized = text
        .iter()
        .filter(|byte| !byte.is_ascii_whitespace())
        .map(|&byte| match byte {
            b'+' => b'-',
            b'/' => b'_',
            other => other,
        })
        .collect::<Vec<u8>>();
    LENIENT_URL_SAFE
        .decode(&normalized)
        .map_err(|error| error.to_string())
}

fn inflate_bounded(
    framing: StreamFraming,
    compressed: &[u8],
    capacity: usize,
) -> io::Result<Vec<u8>> {
    let limit = capacity as u64;
    let mut out = Vec::with_capacity(capacity);
    match framing {
        StreamFraming::Gzip => GzDecoder::new(compressed).take(limit).read_to_end(&mut out)?,
        StreamFraming::Zlib => ZlibDecoder::new(compressed)
            .take(limit)
            .read_to_end(&mut out)?,
        StreamFraming::RawDeflate => DeflateDecoder::new(compressed)
            .take(limit)
            .read_to_end(&mut out)?,
    };
    Ok(out)
}

fn looks_like_zlib_header(bytes: &[u8]) -> bool {
    match bytes {
        [cmf, flg, ..] => {
            *cmf & 0x0f == 8 && (u16::from(*cmf) << 8 | u16::from(*flg)) % 31 == 0
        }
        _ => false,
    }
}

fn text_from_bytes(bytes: Vec<u8>) -> Result<String, DecodeError> {
    String::from_utf8(bytes).map_err(|error| DecodeError::InvalidEncoding {
        message: format!("inflated level string is not UTF-8: {error}"),
    })
}

//! Frame format for the journal.
//!
//! ```text
//! | frame_len (u32 LE) | kind (u8) | body ... | crc32 (u32 LE) |
//! ```
//!
//! `frame_len` counts the whole frame including itself and the CRC. The CRC
//! covers every byte before it.

use crate::error::{StorageError, StorageResult};

/// Bytes a frame adds around its body.
pub const FRAME_OVERHEAD: usize = 4 + 1 + 4;

/// A decoded journal frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Offset of the frame inside the journal.
    pub offset: u64,
    /// Caller-defined frame kind.
    pub kind: u8,
    /// Frame body.
    pub body: Vec<u8>,
}

impl Frame {
    /// Encodes a frame for `kind` and `body`.
    #[must_use]
    pub fn encode(kind: u8, body: &[u8]) -> Vec<u8> {
        let frame_len = FRAME_OVERHEAD + body.len();
        let mut buf = Vec::with_capacity(frame_len);
        buf.extend_from_slice(&(frame_len as u32).to_le_bytes());
        buf.push(kind);
        buf.extend_from_slice(body);
        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes exactly one frame from the start of `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is truncated or fails its checksum.
    pub fn decode(data: &[u8]) -> StorageResult<Self> {
        let result = scan(data);
        match (result.frames.into_iter().next(), result.damage) {
            (Some(frame), _) => Ok(frame),
            (None, Some(damage)) => Err(damage.into_error()),
            (None, None) => Err(StorageError::Corrupted("empty input".into())),
        }
    }

    /// Returns the encoded size of this frame.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        FRAME_OVERHEAD + self.body.len()
    }
}

/// Where a scan stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Damage {
    /// The last frame is incomplete.
    TornTail { offset: u64 },
    /// A frame failed its checksum.
    Checksum { offset: u64, expected: u32, actual: u32, last: bool },
    /// A frame declares an impossible length.
    BadLength { offset: u64, len: usize },
}

impl Damage {
    /// Damage confined to the final frame is a crash artifact and can be cut.
    pub(crate) fn is_tail(&self) -> bool {
        match self {
            Damage::TornTail { .. } => true,
            Damage::Checksum { last, .. } => *last,
            Damage::BadLength { .. } => false,
        }
    }

    pub(crate) fn offset(&self) -> u64 {
        match self {
            Damage::TornTail { offset }
            | Damage::Checksum { offset, .. }
            | Damage::BadLength { offset, .. } => *offset,
        }
    }

    pub(crate) fn into_error(self) -> StorageError {
        match self {
            Damage::Checksum {
                offset,
                expected,
                actual,
                ..
            } => StorageError::ChecksumMismatch {
                offset,
                expected,
                actual,
            },
            Damage::TornTail { offset } => {
                StorageError::Corrupted(format!("incomplete frame at offset {offset}"))
            }
            Damage::BadLength { offset, len } => {
                StorageError::Corrupted(format!("invalid frame length {len} at offset {offset}"))
            }
        }
    }
}

/// Result of walking a byte buffer frame by frame.
#[derive(Debug, Default)]
pub(crate) struct Scan {
    pub(crate) frames: Vec<Frame>,
    pub(crate) valid_len: u64,
    pub(crate) damage: Option<Damage>,
}

pub(crate) fn scan(data: &[u8]) -> Scan {
    let mut out = Scan::default();
    let mut pos = 0usize;

    while pos < data.len() {
        let offset = pos as u64;
        if data.len() - pos < 4 {
            out.damage = Some(Damage::TornTail { offset });
            break;
        }
        let len = u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
            as usize;
        if len < FRAME_OVERHEAD {
            out.damage = Some(Damage::BadLength { offset, len });
            break;
        }
        if pos + len > data.len() {
            out.damage = Some(Damage::TornTail { offset });
            break;
        }

        let frame = &data[pos..pos + len];
        let stored = u32::from_le_bytes([
            frame[len - 4],
            frame[len - 3],
            frame[len - 2],
            frame[len - 1],
        ]);
        let computed = compute_crc32(&frame[..len - 4]);
        if stored != computed {
            out.damage = Some(Damage::Checksum {
                offset,
                expected: stored,
                actual: computed,
                last: pos + len == data.len(),
            });
            break;
        }

        out.frames.push(Frame {
            offset,
            kind: frame[4],
            body: frame[5..len - 4].to_vec(),
        });
        pos += len;
        out.valid_len = pos as u64;
    }

    out
}

/// Computes the IEEE CRC32 of `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

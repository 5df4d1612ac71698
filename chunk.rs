//! PNG chunk-stream codec.
//!
//! A PNG file is an 8-byte signature followed by a sequence of chunks:
//!
//! ```text
//! [length:4 BE][type:4 ASCII][data:length][crc:4 BE]
//! ```
//!
//! [`parse`] reads chunks up to and including the first `IEND`. The stored CRC
//! is kept as read and never checked, so files with a stale CRC still open.
//! [`serialize`] always recomputes the CRC over `type ++ data`, ignoring
//! whatever value the record carries.

use crate::error::{Result, SealError};
use std::fmt;
use tracing::debug;

/// The fixed 8-byte PNG signature
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Four-byte chunk type tag
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkType(pub [u8; 4]);

#[allow(non_upper_case_globals)]
impl ChunkType {
    pub const IHDR: Self = Self(*b"IHDR");
    pub const IDAT: Self = Self(*b"IDAT");
    pub const IEND: Self = Self(*b"IEND");
    pub const tEXt: Self = Self(*b"tEXt");

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn is_terminal(&self) -> bool {
        *self == Self::IEND
    }

    pub fn is_text(&self) -> bool {
        *self == Self::tEXt
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkType({})", self)
    }
}

/// One chunk record. The length field is implied by `data.len()`.
#[derive(Clone, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_type: ChunkType,
    pub data: Vec<u8>,
    /// CRC as read from the stream, or 0 for freshly built chunks
    pub crc: u32,
}

impl Chunk {
    /// Build a chunk with a correct CRC
    pub fn new(chunk_type: ChunkType, data: Vec<u8>) -> Self {
        let crc = compute_crc(&chunk_type, &data);
        Self {
            chunk_type,
            data,
            crc,
        }
    }

    pub fn length(&self) -> usize {
        self.data.len()
    }

    /// Whether the stored CRC matches the chunk contents
    pub fn has_valid_crc(&self) -> bool {
        self.crc == compute_crc(&self.chunk_type, &self.data)
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("chunk_type", &self.chunk_type)
            .field("data", &(&self.data[..self.data.len().min(12)], self.data.len()))
            .field("crc", &format_args!("{:#010x}", self.crc))
            .finish()
    }
}

/// CRC-32 over the type tag followed by the data
pub fn compute_crc(chunk_type: &ChunkType, data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type.as_bytes());
    hasher.update(data);
    hasher.finalize()
}

struct ByteReader<'b> {
    rest: &'b [u8],
    offset: usize,
}

impl<'b> ByteReader<'b> {
    fn take(&mut self, n: usize, what: &str) -> Result<&'b [u8]> {
        if self.rest.len() < n {
            return Err(SealError::format(format!(
                "truncated chunk stream: {} needs {} bytes at offset {}, only {} left",
                what,
                n,
                self.offset,
                self.rest.len()
            )));
        }
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        self.offset += n;
        Ok(head)
    }

    fn take_u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Parse a PNG byte stream into its chunks.
///
/// Stops after the first `IEND` chunk (inclusive) or when the input runs out
/// exactly on a chunk boundary.
pub fn parse(bytes: &[u8]) -> Result<Vec<Chunk>> {
    if bytes.len() < PNG_SIGNATURE.len() || bytes[..PNG_SIGNATURE.len()] != PNG_SIGNATURE {
        return Err(SealError::format("not a PNG file: signature mismatch"));
    }

    let mut reader = ByteReader {
        rest: &bytes[PNG_SIGNATURE.len()..],
        offset: PNG_SIGNATURE.len(),
    };
    let mut chunks = Vec::new();

    while !reader.rest.is_empty() {
        let length = reader.take_u32("chunk length")? as usize;
        let type_bytes = reader.take(4, "chunk type")?;
        let chunk_type = ChunkType([type_bytes[0], type_bytes[1], type_bytes[2], type_bytes[3]]);
        let data = reader.take(length, "chunk data")?.to_vec();
        let crc = reader.take_u32("chunk crc")?;

        chunks.push(Chunk {
            chunk_type,
            data,
            crc,
        });

        if chunk_type.is_terminal() {
            break;
        }
    }

    if !reader.rest.is_empty() {
        debug!(trailing = reader.rest.len(), "ignoring bytes after IEND");
    }
    debug!(chunks = chunks.len(), "parsed chunk stream");
    Ok(chunks)
}

/// Serialize chunks back into a PNG byte stream with fresh CRCs
pub fn serialize(chunks: &[Chunk]) -> Result<Vec<u8>> {
    let total: usize = chunks.iter().map(|c| 12 + c.data.len()).sum();
    let mut out = Vec::with_capacity(PNG_SIGNATURE.len() + total);
    out.extend_from_slice(&PNG_SIGNATURE);

    for chunk in chunks {
        let length = u32::try_from(chunk.data.len()).map_err(|_| {
            SealError::format(format!(
                "{} chunk too large: {} bytes",
                chunk.chunk_type,
                chunk.data.len()
            ))
        })?;
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(chunk.chunk_type.as_bytes());
        out.extend_from_slice(&chunk.data);
        out.extend_from_slice(&compute_crc(&chunk.chunk_type, &chunk.data).to_be_bytes());
    }

    Ok(out)
}

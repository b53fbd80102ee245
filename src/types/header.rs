//! File header for store snapshots.

use std::io::{Read, Write};

use crate::types::error::{KarmaError, KarmaResult};
use crate::types::{FORMAT_VERSION, SNAPSHOT_MAGIC};

/// Header of a snapshot file. Fixed size: 16 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotHeader {
    /// Magic bytes: [0x4B, 0x52, 0x4D, 0x41] ("KRMA").
    pub magic: [u8; 4],
    /// Format version (currently 1).
    pub version: u32,
    /// Length in bytes of the compressed body that follows the header.
    pub body_len: u64,
}

/// The fixed size of a SnapshotHeader on disk: 16 bytes.
pub const HEADER_SIZE: usize = 16;

impl SnapshotHeader {
    /// Create a header for a body of `body_len` bytes.
    pub fn new(body_len: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            body_len,
        }
    }

    /// Write this header. Writes exactly 16 bytes.
    ///
    /// Layout (all little-endian):
    /// - 0x00..0x04: magic
    /// - 0x04..0x08: version (u32)
    /// - 0x08..0x10: body_len (u64)
    pub fn write_to(&self, writer: &mut impl Write) -> KarmaResult<()> {
        writer.write_all(&self.magic)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&self.body_len.to_le_bytes())?;
        Ok(())
    }

    /// Read and validate a header.
    pub fn read_from(reader: &mut impl Read) -> KarmaResult<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => KarmaError::Truncated,
            _ => KarmaError::Io(e),
        })?;

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[0..4]);
        if magic != SNAPSHOT_MAGIC {
            return Err(KarmaError::InvalidMagic);
        }

        let mut version = [0u8; 4];
        version.copy_from_slice(&buf[4..8]);
        let version = u32::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(KarmaError::UnsupportedVersion(version));
        }

        let mut body_len = [0u8; 8];
        body_len.copy_from_slice(&buf[8..16]);

        Ok(Self {
            magic,
            version,
            body_len: u64::from_le_bytes(body_len),
        })
    }
}

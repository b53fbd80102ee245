//! Reads store snapshots from disk.

use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

use crate::store::{MemoryStore, StoreSnapshot};
use crate::types::error::{KarmaError, KarmaResult};
use crate::types::header::{SnapshotHeader, HEADER_SIZE};
use crate::types::Clock;

use super::compression::decompress_body;

/// Reader for snapshot files.
pub struct SnapshotReader;

impl SnapshotReader {
    /// Load the snapshot at `path` into a new store.
    pub fn read_from_file(path: &Path, clock: Arc<dyn Clock>) -> KarmaResult<MemoryStore> {
        let file = std::fs::File::open(path)?;
        if file.metadata()?.len() < HEADER_SIZE as u64 {
            return Err(KarmaError::Truncated);
        }
        // SAFETY: the map is read-only and dropped before this function returns.
        let mmap = unsafe { Mmap::map(&file)? };
        let snapshot = Self::parse(&mmap)?;
        Ok(MemoryStore::from_snapshot(snapshot, clock))
    }

    /// Load the snapshot at `path`, or start an empty store if the file does
    /// not exist yet.
    pub fn read_or_create(path: &Path, clock: Arc<dyn Clock>) -> KarmaResult<MemoryStore> {
        if path.exists() {
            Self::read_from_file(path, clock)
        } else {
            log::info!("No snapshot at {}, starting empty", path.display());
            Ok(MemoryStore::with_clock(clock))
        }
    }

    /// Read a snapshot image from any reader.
    pub fn read_from(reader: &mut impl Read) -> KarmaResult<StoreSnapshot> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::parse(&data)
    }

    fn parse(data: &[u8]) -> KarmaResult<StoreSnapshot> {
        if data.len() < HEADER_SIZE {
            return Err(KarmaError::Truncated);
        }
        let header = SnapshotHeader::read_from(&mut Cursor::new(&data[..HEADER_SIZE]))?;

        let end = usize::try_from(header.body_len)
            .ok()
            .and_then(|len| HEADER_SIZE.checked_add(len))
            .ok_or(KarmaError::Truncated)?;
        if end > data.len() {
            return Err(KarmaError::Truncated);
        }

        let body = decompress_body(&data[HEADER_SIZE..end])?;
        Ok(serde_json::from_slice(&body)?)
    }
}

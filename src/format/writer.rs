//! Writes store snapshots to disk.

use std::io::Write;
use std::path::Path;

use crate::store::{MemoryStore, StoreSnapshot};
use crate::types::error::KarmaResult;
use crate::types::header::SnapshotHeader;

use super::compression::compress_body;

/// Writer for snapshot files.
pub struct SnapshotWriter;

impl SnapshotWriter {
    /// Snapshot `store` into the file at `path`, replacing it atomically.
    ///
    /// The data is written to a sibling temporary file first and then renamed
    /// over `path`, so a crash never leaves a half-written snapshot behind.
    pub fn write_to_file(store: &MemoryStore, path: &Path) -> KarmaResult<()> {
        let snapshot = store.snapshot();
        let tmp_path = path.with_extension("krm.tmp");
        {
            let file = std::fs::File::create(&tmp_path)?;
            let mut writer = std::io::BufWriter::new(file);
            Self::write_to(&snapshot, &mut writer)?;
        }
        std::fs::rename(&tmp_path, path)?;
        log::debug!(
            "Wrote snapshot to {} ({} ranked, {} sets, {} values)",
            path.display(),
            snapshot.ranked.len(),
            snapshot.sets.len(),
            snapshot.values.len()
        );
        Ok(())
    }

    /// Write a snapshot to any writer.
    pub fn write_to(snapshot: &StoreSnapshot, writer: &mut impl Write) -> KarmaResult<()> {
        let body = serde_json::to_vec(snapshot)?;
        let compressed = compress_body(&body);

        let header = SnapshotHeader::new(compressed.len() as u64);
        header.write_to(writer)?;
        writer.write_all(&compressed)?;
        writer.flush()?;
        Ok(())
    }
}

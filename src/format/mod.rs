//! Snapshot file I/O for the in-memory store.

pub mod compression;
pub mod reader;
pub mod writer;

pub use reader::SnapshotReader;
pub use writer::SnapshotWriter;

//! All data types for the karma library.

pub mod action;
pub mod clock;
pub mod error;
pub mod header;
pub mod keys;

pub use action::Action;
pub use clock::{from_unix_secs, to_unix_secs, Clock, ManualClock, SystemClock};
pub use error::{KarmaError, KarmaResult};
pub use header::{SnapshotHeader, HEADER_SIZE};

/// Magic bytes at the start of every snapshot file.
pub const SNAPSHOT_MAGIC: [u8; 4] = [0x4B, 0x52, 0x4D, 0x41]; // "KRMA"

/// Current snapshot format version.
pub const FORMAT_VERSION: u32 = 1;

/// Default cooldown between modifications of one term by one user: 5 minutes.
pub const DEFAULT_COOLDOWN_SECS: u64 = 300;

/// Default minimum absolute score for both sides of a new link.
pub const DEFAULT_LINK_THRESHOLD: i64 = 10;

/// Default decay window: 30 days.
pub const DEFAULT_DECAY_INTERVAL_SECS: u64 = 30 * 24 * 60 * 60;

/// Largest number of terms a best/worst listing returns.
pub const MAX_LIST_SIZE: usize = 25;

/// Number of terms a listing returns when none is requested.
pub const DEFAULT_LIST_SIZE: usize = 5;

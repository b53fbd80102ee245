//! Support for the `karma` command-line tool.

pub mod commands;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{KarmaConfig, KarmaSettings};
use crate::engine::{KarmaEngine, StaticDirectory};
use crate::format::{SnapshotReader, SnapshotWriter};
use crate::store::MemoryStore;
use crate::types::{Clock, KarmaResult, SystemClock};

/// How a command ended, mapped to the process exit code by the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// The command ran.
    Done,
    /// The engine declined the request (cooldown, threshold, missing term).
    Refused,
}

impl CommandStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Done => 0,
            Self::Refused => 2,
        }
    }
}

/// Everything a command needs: where the store lives, the settings, and the
/// output format.
pub struct CliContext {
    store_path: PathBuf,
    settings: KarmaSettings,
    json: bool,
}

impl CliContext {
    /// Build a context, loading settings from `config` when given.
    pub fn new(store_path: PathBuf, config: Option<&Path>, json: bool) -> KarmaResult<Self> {
        let settings = match config {
            Some(path) => KarmaSettings::load(path)?,
            None => KarmaSettings::default(),
        };
        Ok(Self {
            store_path,
            settings,
            json,
        })
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    pub fn settings(&self) -> &KarmaSettings {
        &self.settings
    }

    pub fn json(&self) -> bool {
        self.json
    }

    /// Open the store (creating an empty one if the file is missing) and wrap
    /// it in an engine.
    pub fn open(&self) -> KarmaResult<KarmaEngine<MemoryStore>> {
        let config = KarmaConfig::from_settings(&self.settings)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = SnapshotReader::read_or_create(&self.store_path, clock.clone())?;
        Ok(KarmaEngine::with_clock(store, config, clock))
    }

    /// Write the engine's store back to disk.
    pub fn save(&self, engine: &KarmaEngine<MemoryStore>) -> KarmaResult<()> {
        SnapshotWriter::write_to_file(engine.store(), &self.store_path)
    }

    /// User directory from the `[users]` table of the settings.
    pub fn directory(&self) -> StaticDirectory {
        StaticDirectory::new(self.settings.users.clone())
    }
}

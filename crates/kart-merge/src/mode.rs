use kart_store::EntryMode;
use serde::{Deserialize, Serialize};

/// Mirrors [`EntryMode`] with `serde` support, so merge-index entries can be
/// written to the persisted index file. Kept as a local type rather than
/// adding a `serde` dependency to `kart-store` for a need only the merge
/// engine has.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Blob,
    BlobExecutable,
    Tree,
    Symlink,
    Commit,
}

impl From<EntryMode> for Mode {
    fn from(mode: EntryMode) -> Self {
        match mode {
            EntryMode::Blob => Mode::Blob,
            EntryMode::BlobExecutable => Mode::BlobExecutable,
            EntryMode::Tree => Mode::Tree,
            EntryMode::Symlink => Mode::Symlink,
            EntryMode::Commit => Mode::Commit,
        }
    }
}

impl From<Mode> for EntryMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Blob => EntryMode::Blob,
            Mode::BlobExecutable => EntryMode::BlobExecutable,
            Mode::Tree => EntryMode::Tree,
            Mode::Symlink => EntryMode::Symlink,
            Mode::Commit => EntryMode::Commit,
        }
    }
}

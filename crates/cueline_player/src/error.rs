// SPDX-License-Identifier: MIT OR Apache-2.0
//! Player errors.

use cueline_timeline::PersistError;
use thiserror::Error;

/// Errors that stop the player
#[derive(Debug, Error)]
pub enum PlayerError {
    /// Reading the config file or spawning the ticker failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The config file is not valid RON for [`crate::config::PlayerConfig`]
    #[error("Invalid config: {0}")]
    Config(#[from] ron::error::SpannedError),
    /// The sequence file could not be loaded
    #[error("Failed to load sequence: {0}")]
    Persist(#[from] PersistError),
}

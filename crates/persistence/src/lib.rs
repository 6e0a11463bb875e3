#![deny(warnings)]

//! Save/load snapshots of the full game state.
//!
//! Snapshots are versioned JSON documents. Loading must reconstruct the
//! exact state that was saved, in particular the cohort keys of the
//! customer market, so that a save/load cycle can never duplicate cohorts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sim_runtime::GameState;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot version {0} (expected {SNAPSHOT_VERSION})")]
    UnsupportedVersion(u32),
}

/// A versioned, timestamped capture of the whole simulation.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub state: GameState,
}

impl Snapshot {
    pub fn capture(state: &GameState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            state: state.clone(),
        }
    }
}

/// Serialize a snapshot of `state` to pretty JSON.
pub fn to_json(state: &GameState) -> Result<String, PersistError> {
    Ok(serde_json::to_string_pretty(&Snapshot::capture(state))?)
}

/// Parse a snapshot produced by [`to_json`], rejecting unknown versions.
pub fn from_json(text: &str) -> Result<GameState, PersistError> {
    let snapshot: Snapshot = serde_json::from_str(text)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(PersistError::UnsupportedVersion(snapshot.version));
    }
    Ok(snapshot.state)
}

pub fn save_to_path<P: AsRef<Path>>(state: &GameState, path: P) -> Result<(), PersistError> {
    fs::write(path.as_ref(), to_json(state)?)?;
    info!(path = %path.as_ref().display(), "game saved");
    Ok(())
}

pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<GameState, PersistError> {
    let text = fs::read_to_string(path.as_ref())?;
    let state = from_json(&text)?;
    info!(path = %path.as_ref().display(), month = state.global_month, "game loaded");
    Ok(state)
}

//! Session snapshots.
//!
//! Best-effort JSON persistence of a [`DemoSession`]. Restoring never
//! fails: a missing, unreadable, corrupt, or inconsistent snapshot yields a
//! fresh EMPTY session.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SnapshotError;
use crate::session::{DemoSession, Phase};
use crate::timeline::Schedule;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotFile {
    version: u32,
    saved_at: DateTime<Utc>,
    session: DemoSession,
}

/// How a restore went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStatus {
    /// The snapshot was loaded.
    Restored,
    /// No snapshot existed.
    Missing,
    /// The snapshot was unusable and was discarded.
    Discarded,
}

/// File-backed snapshot store.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Creates a store writing to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `session`, replacing any previous snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError` if serialization or the write fails.
    pub fn save(&self, session: &DemoSession) -> Result<(), SnapshotError> {
        let file = SnapshotFile {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            session: session.clone(),
        };
        let json = serde_json::to_vec_pretty(&file)?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(|source| SnapshotError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| SnapshotError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), phase = %session.phase(), "snapshot saved");
        Ok(())
    }

    /// Loads the snapshot, falling back to a fresh session.
    #[must_use]
    pub fn restore(&self, schedule: &Schedule) -> (DemoSession, RestoreStatus) {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return (DemoSession::new(), RestoreStatus::Missing);
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "snapshot unreadable; starting fresh"
                );
                return (DemoSession::new(), RestoreStatus::Discarded);
            }
        };
        match restore_from_str(&raw, schedule) {
            Ok(session) => (session, RestoreStatus::Restored),
            Err(reason) => {
                warn!(path = %self.path.display(), %reason, "discarding snapshot; starting fresh");
                (DemoSession::new(), RestoreStatus::Discarded)
            }
        }
    }

    /// Deletes the snapshot if present.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Io` if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<(), SnapshotError> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(SnapshotError::Io {
                path: self.path.clone(),
                source: e,
            }),
            _ => Ok(()),
        }
    }
}

/// Parses and checks a snapshot document.
///
/// A session captured mid-launch comes back in TYPED: the generation
/// request it was waiting for did not survive.
///
/// # Errors
///
/// Returns a description of why the snapshot is unusable.
pub fn restore_from_str(raw: &str, schedule: &Schedule) -> Result<DemoSession, String> {
    let file: SnapshotFile = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    if file.version != SNAPSHOT_VERSION {
        return Err(format!("unsupported snapshot version {}", file.version));
    }
    let mut session = file.session;
    session.validate(schedule)?;
    if session.phase == Phase::Launching {
        session.phase = Phase::Typed;
    }
    Ok(session)
}

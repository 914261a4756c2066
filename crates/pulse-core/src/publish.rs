//! Atomic snapshot publishing.
//!
//! The dashboard polls the output file at arbitrary times, so it must only
//! ever see a complete document. Each publish writes the snapshot to
//! `<target>.tmp` in the same directory, syncs it, then renames it over the
//! target. A failure at any step leaves the previous file untouched.
//!
//! Publishing is best-effort: [`SnapshotPublisher::publish`] logs and swallows
//! errors, and the next trigger (trade batch or fetch cycle) retries
//! naturally. The file I/O (including the fsync) runs on tokio's blocking
//! pool, never on a runtime worker.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{PulseError, PulseResult};
use crate::state::SharedMarketState;
use crate::types::MarketSnapshot;

/// Writes [`MarketSnapshot`]s of a [`SharedMarketState`] to a file.
pub struct SnapshotPublisher {
    state: Arc<SharedMarketState>,
    target: PathBuf,
    tmp: PathBuf,
    /// Serializes writers so two producers never share the temp file and the
    /// last rename always carries the newest snapshot.
    write_lock: Mutex<()>,
    published: AtomicU64,
    failed: AtomicU64,
}

impl SnapshotPublisher {
    pub fn new(state: Arc<SharedMarketState>, target: impl Into<PathBuf>) -> Self {
        let target = target.into();
        let tmp = temp_path(&target);
        Self {
            state,
            target,
            tmp,
            write_lock: Mutex::const_new(()),
            published: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Publish the current state, logging any failure.
    ///
    /// Returns `true` if the file was replaced.
    pub async fn publish(&self) -> bool {
        match self.try_publish().await {
            Ok(bytes) => {
                debug!("[publish] wrote {bytes} bytes to {}", self.target.display());
                true
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(kind = e.kind(), "[publish] {} left stale: {e}", self.target.display());
                false
            }
        }
    }

    /// Publish the current state, returning the number of bytes written.
    pub async fn try_publish(&self) -> PulseResult<usize> {
        let _guard = self.write_lock.lock().await;

        // The state lock is released as soon as the copy is taken.
        let snapshot = self.state.read_snapshot();
        let bytes = encode(&snapshot)?;
        let len = bytes.len();

        let (target, tmp) = (self.target.clone(), self.tmp.clone());
        tokio::task::spawn_blocking(move || write_atomic(&target, &tmp, &bytes))
            .await
            .map_err(|e| PulseError::Io(std::io::Error::other(format!("publish task: {e}"))))??;

        self.published.fetch_add(1, Ordering::Relaxed);
        Ok(len)
    }

    /// Number of successful publishes.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Number of failed publishes.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Serialize a snapshot as 4-space-indented UTF-8 JSON.
pub fn encode(snapshot: &MarketSnapshot) -> PulseResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(1024);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    snapshot.serialize(&mut ser)?;
    Ok(buf)
}

/// `<target>.tmp`, always a sibling of `target`.
fn temp_path(target: &Path) -> PathBuf {
    let mut s: OsString = target.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}

fn write_atomic(target: &Path, tmp: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let result = (|| {
        let mut file = File::create(tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);
        fs::rename(tmp, target)
    })();

    if result.is_err() {
        let _ = fs::remove_file(tmp);
    }
    result
}

//! Persisted auto-restart flag.
//!
//! An extension auto-update can reload the hosting context out from
//! under a user who was actively sharing. The update path calls
//! [`AutoRestartStore::write`] before the reload; after the bridge
//! reinitializes and observes `Ready`, it consumes the flag exactly once
//! and, if it was set, starts sharing again. Consumption always clears
//! the flag so an unrelated later reload never restarts sharing.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

/// Storage key (file name) for the flag.
const STORAGE_KEY: &str = "auto-restart";

/// One persisted boolean-like flag. Absent means unset.
pub trait AutoRestartStore: Send + Sync {
    /// Set the flag. Persisted across a full reload of the hosting
    /// context.
    fn write(&self);

    /// Atomically read and clear the flag; returns whether it was set.
    /// After a successful consumption the flag is never left set.
    fn consume_if_set(&self) -> bool;

    /// Non-consuming read, for diagnostics only.
    fn peek(&self) -> bool;
}

/// In-memory store for tests and hosts without persistent storage.
#[derive(Debug, Default)]
pub struct MemoryRestartStore {
    set: AtomicBool,
}

impl MemoryRestartStore {
    /// New store with the flag unset.
    pub fn new() -> Self {
        Self::default()
    }
}

impl AutoRestartStore for MemoryRestartStore {
    fn write(&self) {
        self.set.store(true, Ordering::SeqCst);
    }

    fn consume_if_set(&self) -> bool {
        self.set.swap(false, Ordering::SeqCst)
    }

    fn peek(&self) -> bool {
        self.set.load(Ordering::SeqCst)
    }
}

/// File-backed store: one marker file under a host-chosen directory.
///
/// I/O failures degrade to "unset" with a logged warning; the flag is an
/// optimization, never worth failing initialization over.
#[derive(Debug)]
pub struct FsRestartStore {
    path: PathBuf,
}

impl FsRestartStore {
    /// Store the flag as `<dir>/auto-restart`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { path: dir.into().join(STORAGE_KEY) }
    }
}

impl AutoRestartStore for FsRestartStore {
    fn write(&self) {
        if let Err(err) = std::fs::write(&self.path, b"1") {
            warn!(path = %self.path.display(), %err, "failed to persist auto-restart flag");
        }
    }

    fn consume_if_set(&self) -> bool {
        match std::fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(err) if err.kind() == io::ErrorKind::NotFound => false,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "failed to clear auto-restart flag");
                false
            },
        }
    }

    fn peek(&self) -> bool {
        self.path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_flag_consumes_exactly_once() {
        let store = MemoryRestartStore::new();
        assert!(!store.consume_if_set());

        store.write();
        assert!(store.peek());
        assert!(store.consume_if_set());
        assert!(!store.peek());
        assert!(!store.consume_if_set());
    }

    #[test]
    fn fs_flag_round_trip() {
        let dir = std::env::temp_dir().join(format!("peerlink-restart-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let store = FsRestartStore::new(&dir);

        assert!(!store.peek());
        assert!(!store.consume_if_set());

        store.write();
        assert!(store.peek());
        assert!(store.consume_if_set());
        assert!(!store.consume_if_set());

        std::fs::remove_dir_all(&dir).expect("cleanup temp dir");
    }

    #[test]
    fn fs_write_survives_new_store_instance() {
        let dir =
            std::env::temp_dir().join(format!("peerlink-restart-reload-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create temp dir");

        // Separate instances model the storage surviving a context
        // reload.
        FsRestartStore::new(&dir).write();
        let reloaded = FsRestartStore::new(&dir);
        assert!(reloaded.consume_if_set());

        std::fs::remove_dir_all(&dir).expect("cleanup temp dir");
    }
}

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async lock per physical path.
///
/// Parameter saves, backup creation and restores all write managed files;
/// holding the path's guard serializes them per file while unrelated files
/// proceed in parallel.
#[derive(Debug, Clone, Default)]
pub struct WriteLocks {
    locks: Arc<Mutex<HashMap<Utf8PathBuf, Arc<Mutex<()>>>>>,
}

impl WriteLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `path`.
    ///
    /// Paths nobody holds or waits for are forgotten on the way.
    pub async fn lock(&self, path: &Utf8Path) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Guards and waiters each own a clone
            locks.retain(|held, lock| held.as_path() == path || Arc::strong_count(lock) > 1);
            locks
                .entry(path.to_path_buf())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of paths currently tracked.
    pub async fn tracked_paths(&self) -> usize {
        self.locks.lock().await.len()
    }
}

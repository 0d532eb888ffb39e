//! Refreshing the index when diagram files change behind the host's back.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::debug;
use notify::{recommended_watcher, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedSender;

use crate::bus::BusEvent;

/// Watches `root` recursively and forwards changed `.json` paths as
/// [`BusEvent::FilesChanged`]. The watcher stops when the returned value is
/// dropped.
pub fn watch_workspace(
    root: &Path,
    events: UnboundedSender<BusEvent>,
) -> notify::Result<RecommendedWatcher> {
    let mut watcher = recommended_watcher(move |res: notify::Result<notify::Event>| {
        let Ok(event) = res else { return };
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return;
        }
        let paths: Vec<PathBuf> = event
            .paths
            .into_iter()
            .filter(|p| p.extension().is_some_and(|e| e == "json"))
            .collect();
        if !paths.is_empty() {
            let _ = events.send(BusEvent::FilesChanged(paths));
        }
    })?;

    watcher.watch(root, RecursiveMode::Recursive)?;
    debug!(root:? = root; "Watching workspace");
    Ok(watcher)
}

/// Paths the host wrote itself, with the time of the write.
///
/// An atomic save fires several notifications (temp file, rename). Events for
/// a recorded path inside the window are not external changes and are
/// dropped.
#[derive(Debug)]
pub struct SelfWrites {
    recent: HashMap<PathBuf, Instant>,
    window: Duration,
}

impl Default for SelfWrites {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

impl SelfWrites {
    pub fn new(window: Duration) -> Self {
        Self {
            recent: HashMap::new(),
            window,
        }
    }

    pub fn record(&mut self, path: PathBuf) {
        self.recent.insert(path, Instant::now());
    }

    /// Whether `path` was written by the host within the window. Stale
    /// entries are cleaned up on lookup.
    pub fn is_recent(&mut self, path: &Path) -> bool {
        match self.recent.get(path) {
            Some(written_at) if written_at.elapsed() < self.window => true,
            Some(_) => {
                self.recent.remove(path);
                false
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_paths_are_recent_within_window() {
        let mut writes = SelfWrites::default();
        let path = PathBuf::from("/ws/a.json");
        assert!(!writes.is_recent(&path));
        writes.record(path.clone());
        assert!(writes.is_recent(&path));
        assert!(!writes.is_recent(Path::new("/ws/b.json")));
    }

    #[test]
    fn stale_entries_expire() {
        let mut writes = SelfWrites::new(Duration::ZERO);
        let path = PathBuf::from("/ws/a.json");
        writes.record(path.clone());
        assert!(!writes.is_recent(&path));
        assert!(writes.recent.is_empty());
    }
}

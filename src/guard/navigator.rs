//! Navigation seam and in-memory history.

use std::sync::Mutex;

use crate::gate::TransientBypass;
use crate::routing::split_path_query;

/// One history entry: a location plus the optional one-shot bypass payload
/// attached to the transition that created it.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// Full location, pathname plus search (`/app/quests?x=1`).
    pub path: String,
    pub bypass: Option<TransientBypass>,
}

impl HistoryEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            bypass: None,
        }
    }

    pub fn pathname(&self) -> &str {
        split_path_query(&self.path).0
    }

    pub fn search(&self) -> &str {
        split_path_query(&self.path).1
    }
}

/// Redirect primitive plus bypass transport.
///
/// The bypass payload is typed and travels through the navigation call
/// itself, never through a global; it is readable only from the entry the
/// transition created.
pub trait Navigator: Send + Sync {
    /// The entry the client is currently rendering.
    fn current(&self) -> HistoryEntry;

    /// Navigate to `path`, dropping any forward history.
    fn redirect(&self, path: &str);

    /// Navigate to `path` with a bypass payload attached to the new entry.
    fn redirect_with_bypass(&self, path: &str, bypass: TransientBypass);
}

struct NavHistory {
    entries: Vec<HistoryEntry>,
    index: usize,
}

/// In-memory navigator backing the demo binary and the test suites.
pub struct InMemoryNavigator {
    inner: Mutex<NavHistory>,
}

impl InMemoryNavigator {
    pub fn new(initial_path: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(NavHistory {
                entries: vec![HistoryEntry::new(initial_path)],
                index: 0,
            }),
        }
    }

    fn push(&self, entry: HistoryEntry) {
        let mut history = self.inner.lock().unwrap();
        let index = history.index;
        history.entries.truncate(index + 1);
        history.entries.push(entry);
        history.index += 1;
    }

    /// Step back in history, if possible.
    pub fn back(&self) {
        let mut history = self.inner.lock().unwrap();
        history.index = history.index.saturating_sub(1);
    }

    /// Step forward in history, if possible.
    pub fn forward(&self) {
        let mut history = self.inner.lock().unwrap();
        if history.index + 1 < history.entries.len() {
            history.index += 1;
        }
    }

    /// Simulate a full page reload: the bypass payload does not survive.
    pub fn reload(&self) {
        let mut history = self.inner.lock().unwrap();
        let index = history.index;
        history.entries[index].bypass = None;
    }

    /// Paths visited so far, oldest first.
    pub fn visited(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .entries
            .iter()
            .map(|entry| entry.path.clone())
            .collect()
    }
}

impl Navigator for InMemoryNavigator {
    fn current(&self) -> HistoryEntry {
        let history = self.inner.lock().unwrap();
        history.entries[history.index].clone()
    }

    fn redirect(&self, path: &str) {
        self.push(HistoryEntry::new(path));
    }

    fn redirect_with_bypass(&self, path: &str, bypass: TransientBypass) {
        self.push(HistoryEntry {
            path: path.to_string(),
            bypass: Some(bypass),
        });
    }
}

//! The event surface the capture engine listens on.
//!
//! An IDE integration implements [`EventSurface`]; [`LocalSurface`] is an
//! in-process implementation where the host pushes events with
//! [`LocalSurface::dispatch`] on its own (UI) thread.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::types::{EventCategory, HostEvent, HostInfo};

/// Callback invoked for each event of a subscribed category.
pub type Listener = Arc<dyn Fn(&HostEvent) + Send + Sync>;

/// Handle returned by [`EventSurface::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Source of IDE events and workspace state.
pub trait EventSurface: Send + Sync {
    fn host_info(&self) -> HostInfo;

    /// Files open in the workspace right now.
    fn open_files(&self) -> Vec<PathBuf>;

    fn subscribe(&self, category: EventCategory, listener: Listener) -> ListenerId;

    /// Remove a listener. Returns `false` if it was not registered; removing
    /// twice is not an error.
    fn unsubscribe(&self, id: ListenerId) -> bool;
}

struct Registration {
    id: ListenerId,
    category: EventCategory,
    listener: Listener,
}

/// In-process event surface.
pub struct LocalSurface {
    host: HostInfo,
    open_files: RwLock<Vec<PathBuf>>,
    listeners: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
}

impl LocalSurface {
    pub fn new(host: HostInfo) -> Self {
        Self {
            host,
            open_files: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Seed the list of files already open before any session starts.
    pub fn with_open_files(self, files: impl IntoIterator<Item = PathBuf>) -> Self {
        write_lock(&self.open_files).extend(files);
        self
    }

    /// Deliver an event to the listeners of its category.
    ///
    /// Listeners run on the calling thread. File open/close events also update
    /// the surface's open-file list. Returns the number of listeners invoked.
    pub fn dispatch(&self, event: &HostEvent) -> usize {
        match event {
            HostEvent::FileOpened { path } => {
                let mut files = write_lock(&self.open_files);
                if !files.contains(path) {
                    files.push(path.clone());
                }
            }
            HostEvent::FileClosed { path } => {
                write_lock(&self.open_files).retain(|p| p != path);
            }
            _ => {}
        }

        let category = event.category();
        // Collect first so listeners never run while the registry is locked.
        let targets: Vec<Listener> = read_lock(&self.listeners)
            .iter()
            .filter(|r| r.category == category)
            .map(|r| Arc::clone(&r.listener))
            .collect();

        for listener in &targets {
            listener(event);
        }
        targets.len()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        read_lock(&self.listeners).len()
    }
}

impl Default for LocalSurface {
    fn default() -> Self {
        Self::new(HostInfo::default())
    }
}

impl EventSurface for LocalSurface {
    fn host_info(&self) -> HostInfo {
        self.host.clone()
    }

    fn open_files(&self) -> Vec<PathBuf> {
        read_lock(&self.open_files).clone()
    }

    fn subscribe(&self, category: EventCategory, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        write_lock(&self.listeners).push(Registration {
            id,
            category,
            listener,
        });
        id
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = write_lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|r| r.id != id);
        listeners.len() != before
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

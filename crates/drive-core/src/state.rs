use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use drive_remote::item::partition_names;
use drive_remote::RemoteItem;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::vpath::VirtualPath;

pub type UserId = u64;

/// Cached view of one remote folder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub remote_id: String,
    pub folders: Vec<String>,
    pub files: Vec<String>,
}

impl DirectoryEntry {
    pub fn from_listing(remote_id: impl Into<String>, items: &[RemoteItem]) -> Self {
        let (folders, files) = partition_names(items);
        Self {
            remote_id: remote_id.into(),
            folders,
            files,
        }
    }
}

/// Per-user cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    pub current: VirtualPath,
    pub previous: VirtualPath,
}

impl UserSession {
    pub fn at(root: VirtualPath) -> Self {
        Self {
            current: root.clone(),
            previous: root,
        }
    }
}

/// Process-wide navigation state: sessions by user and cached listings by
/// path. Listings are shared between users. The std locks guard plain map
/// access only; a user's session lock is async and is held for the whole of
/// that user's command so commands from one user never interleave.
#[derive(Default)]
pub struct DriveState {
    root: RwLock<Option<VirtualPath>>,
    sessions: Mutex<HashMap<UserId, Arc<AsyncMutex<UserSession>>>>,
    directories: RwLock<HashMap<VirtualPath, DirectoryEntry>>,
}

impl DriveState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<VirtualPath> {
        self.root.read().ok().and_then(|r| (*r).clone())
    }

    /// Install the root path and its listing. A root with a different name
    /// invalidates every existing session.
    pub fn set_root(&self, root: VirtualPath, entry: DirectoryEntry) {
        let changed = {
            let Ok(mut guard) = self.root.write() else {
                return;
            };
            let changed = guard.as_ref() != Some(&root);
            *guard = Some(root.clone());
            changed
        };
        if changed {
            if let Ok(mut sessions) = self.sessions.lock() {
                sessions.clear();
            }
            info!("root set to {}", root);
        }
        self.store(root, entry);
    }

    /// Lock a user's session, creating it at the root on first use.
    /// Returns `None` before the root is known.
    pub async fn lock_session(&self, user: UserId) -> Option<OwnedMutexGuard<UserSession>> {
        let root = self.root()?;
        let session = {
            let mut sessions = self.sessions.lock().ok()?;
            sessions
                .entry(user)
                .or_insert_with(|| {
                    debug!("new session for user {}", user);
                    Arc::new(AsyncMutex::new(UserSession::at(root)))
                })
                .clone()
        };
        Some(session.lock_owned().await)
    }

    /// Non-blocking snapshot of a user's session; `None` when the user has
    /// none yet or a command of theirs is in flight
    pub fn peek_session(&self, user: UserId) -> Option<UserSession> {
        let session = self.sessions.lock().ok()?.get(&user).cloned()?;
        let guard = session.try_lock().ok()?;
        Some(guard.clone())
    }

    /// Where the user is, without creating a session
    pub fn current_path(&self, user: UserId) -> Option<VirtualPath> {
        self.peek_session(user)
            .map(|s| s.current)
            .or_else(|| self.root())
    }

    pub fn entry(&self, path: &VirtualPath) -> Option<DirectoryEntry> {
        self.directories.read().ok()?.get(path).cloned()
    }

    pub fn remote_id(&self, path: &VirtualPath) -> Option<String> {
        self.directories
            .read()
            .ok()?
            .get(path)
            .map(|e| e.remote_id.clone())
    }

    pub fn store(&self, path: VirtualPath, entry: DirectoryEntry) {
        if let Ok(mut dirs) = self.directories.write() {
            debug!(
                "cached {} ({} folders, {} files)",
                path,
                entry.folders.len(),
                entry.files.len()
            );
            dirs.insert(path, entry);
        }
    }

    pub fn cached_paths(&self) -> usize {
        self.directories.read().map(|d| d.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> DirectoryEntry {
        DirectoryEntry {
            remote_id: id.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_no_session_before_root() {
        let state = DriveState::new();
        assert!(state.lock_session(1).await.is_none());
        assert_eq!(state.current_path(1), None);
    }

    #[tokio::test]
    async fn test_session_starts_at_root() {
        let state = DriveState::new();
        let root = VirtualPath::root("R");
        state.set_root(root.clone(), entry("root-id"));

        let session = state.lock_session(7).await.unwrap();
        assert_eq!(*session, UserSession::at(root.clone()));
        drop(session);
        assert_eq!(state.remote_id(&root).as_deref(), Some("root-id"));
    }

    #[tokio::test]
    async fn test_peek_fails_while_locked() {
        let state = DriveState::new();
        state.set_root(VirtualPath::root("R"), entry("r"));
        let guard = state.lock_session(1).await.unwrap();
        assert!(state.peek_session(1).is_none());
        // falls back to the root for a busy user
        assert_eq!(state.current_path(1), Some(VirtualPath::root("R")));
        drop(guard);
        assert!(state.peek_session(1).is_some());
    }

    #[tokio::test]
    async fn test_new_root_resets_sessions() {
        let state = DriveState::new();
        state.set_root(VirtualPath::root("Old"), entry("o"));
        {
            let mut s = state.lock_session(1).await.unwrap();
            s.current = s.current.join("A");
        }
        state.set_root(VirtualPath::root("Old"), entry("o"));
        assert_eq!(state.peek_session(1).unwrap().current.to_string(), "Old/A");

        state.set_root(VirtualPath::root("New"), entry("n"));
        assert!(state.peek_session(1).is_none());
        let s = state.lock_session(1).await.unwrap();
        assert_eq!(s.current, VirtualPath::root("New"));
    }

    #[test]
    fn test_listing_is_shared_by_path() {
        let state = DriveState::new();
        let p = VirtualPath::root("R").join("A");
        let items = vec![
            RemoteItem::folder("1", "Sub"),
            RemoteItem::file("2", "x.txt", "text/plain", 3),
        ];
        state.store(p.clone(), DirectoryEntry::from_listing("a-id", &items));
        let e = state.entry(&p).unwrap();
        assert_eq!(e.folders, vec!["Sub"]);
        assert_eq!(e.files, vec!["x.txt"]);
        assert_eq!(state.cached_paths(), 1);
    }
}

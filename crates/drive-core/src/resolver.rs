use std::sync::Arc;

use drive_remote::{ListQuery, RemoteDrive, RemoteError, RemoteItem};
use thiserror::Error;
use tracing::{debug, info};

use crate::state::{DirectoryEntry, DriveState, UserSession};
use crate::vpath::VirtualPath;

#[derive(Debug, Error)]
pub enum NavError {
    #[error("no authenticated drive session")]
    NotAuthenticated,
    #[error("already at the root directory")]
    AtRoot,
    #[error("{0} is not reachable from the current directory")]
    PathNotFound(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Result of a `cd`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Moved { from: VirtualPath, to: VirtualPath },
    Unchanged(VirtualPath),
}

impl Transition {
    pub fn current(&self) -> &VirtualPath {
        match self {
            Transition::Moved { to, .. } => to,
            Transition::Unchanged(path) => path,
        }
    }
}

/// Resolves navigation tokens against the remote drive and keeps the shared
/// listing cache up to date.
pub struct Navigator {
    drive: Arc<dyn RemoteDrive>,
    state: Arc<DriveState>,
}

impl Navigator {
    pub fn new(drive: Arc<dyn RemoteDrive>, state: Arc<DriveState>) -> Self {
        Self { drive, state }
    }

    pub fn state(&self) -> &Arc<DriveState> {
        &self.state
    }

    /// Fetch the root folder and its listing. Called at start-up when the
    /// drive is already authenticated, and after a successful authentication.
    pub async fn initialize_root(&self) -> Result<VirtualPath, NavError> {
        if !self.drive.is_authenticated() {
            return Err(NavError::NotAuthenticated);
        }
        let root_item = self.drive.root().await?;
        let items = self
            .drive
            .list_children(&ListQuery::children(&root_item.id))
            .await?;
        let root = VirtualPath::root(&root_item.name);
        self.state
            .set_root(root.clone(), DirectoryEntry::from_listing(&root_item.id, &items));
        info!("drive root is {} ({} entries)", root, items.len());
        Ok(root)
    }

    /// The root, initializing it first if this is the first use since the
    /// drive became authenticated
    pub async fn ensure_root(&self) -> Result<VirtualPath, NavError> {
        match self.state.root() {
            Some(root) => Ok(root),
            None => self.initialize_root().await,
        }
    }

    /// Remote id of a path, from the cache or by walking down from the root
    pub async fn remote_id(&self, path: &VirtualPath) -> Result<String, NavError> {
        if let Some(id) = self.state.remote_id(path) {
            return Ok(id);
        }
        let root = self.ensure_root().await?;
        let mut id = self
            .state
            .remote_id(&root)
            .ok_or(NavError::NotAuthenticated)?;
        if path.segments().first() != root.segments().first() {
            return Err(NavError::PathNotFound(path.to_string()));
        }
        for name in &path.segments()[1..] {
            id = self
                .find_folder(&id, name)
                .await?
                .map(|item| item.id)
                .ok_or_else(|| NavError::PathNotFound(path.to_string()))?;
        }
        debug!("resolved {} by walking from the root", path);
        Ok(id)
    }

    /// Re-list a path and overwrite its cache entry
    pub async fn refresh(&self, path: &VirtualPath) -> Result<Vec<RemoteItem>, NavError> {
        let id = self.remote_id(path).await?;
        let items = self.drive.list_children(&ListQuery::children(&id)).await?;
        self.state
            .store(path.clone(), DirectoryEntry::from_listing(id, &items));
        Ok(items)
    }

    async fn find_folder(&self, parent_id: &str, name: &str) -> Result<Option<RemoteItem>, NavError> {
        let found = self
            .drive
            .list_children(&ListQuery::named(parent_id, name).folders_only())
            .await?;
        Ok(found.into_iter().next())
    }

    /// Apply a navigation token to a session. The new directory is listed
    /// before anything is committed, so on error the session is untouched.
    pub async fn change_directory(
        &self,
        session: &mut UserSession,
        token: &str,
    ) -> Result<Transition, NavError> {
        if !self.drive.is_authenticated() {
            return Err(NavError::NotAuthenticated);
        }
        let token = token.trim();
        let root = self.ensure_root().await?;
        let current = session.current.clone();

        let (target, target_id) = match token {
            "." => return Ok(Transition::Unchanged(current)),
            "" | "~" => {
                let id = self.remote_id(&root).await?;
                (root, id)
            }
            ".." => {
                let parent = current.parent().ok_or(NavError::AtRoot)?;
                let id = self.remote_id(&parent).await?;
                (parent, id)
            }
            "-" => {
                let previous = session.previous.clone();
                let id = self.remote_id(&previous).await?;
                (previous, id)
            }
            name => {
                let parent_id = self.remote_id(&current).await?;
                let folder = self
                    .find_folder(&parent_id, name)
                    .await?
                    .ok_or_else(|| NavError::PathNotFound(name.to_string()))?;
                (current.join(folder.name), folder.id)
            }
        };

        let items = self
            .drive
            .list_children(&ListQuery::children(&target_id))
            .await?;
        self.state.store(
            target.clone(),
            DirectoryEntry::from_listing(target_id, &items),
        );

        session.previous = current.clone();
        session.current = target.clone();
        debug!("cd {} -> {}", current, target);
        Ok(Transition::Moved {
            from: current,
            to: target,
        })
    }
}

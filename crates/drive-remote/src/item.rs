use serde::{Deserialize, Serialize};

/// MIME type the remote service uses for folders
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// MIME type of shortcut entries, which are never listed
pub const SHORTCUT_MIME: &str = "application/vnd.google-apps.shortcut";

/// Metadata record for a remote file or folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    /// Absent for folders and native documents
    pub size: Option<u64>,
}

impl RemoteItem {
    pub fn folder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: FOLDER_MIME.to_string(),
            size: None,
        }
    }

    pub fn file(
        id: impl Into<String>,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: mime_type.into(),
            size: Some(size),
        }
    }

    pub fn is_folder(&self) -> bool {
        self.mime_type.starts_with(FOLDER_MIME)
    }
}

/// Split a listing into (folder names, file names), preserving order
pub fn partition_names(items: &[RemoteItem]) -> (Vec<String>, Vec<String>) {
    let mut folders = Vec::new();
    let mut files = Vec::new();
    for item in items {
        if item.is_folder() {
            folders.push(item.name.clone());
        } else {
            files.push(item.name.clone());
        }
    }
    (folders, files)
}

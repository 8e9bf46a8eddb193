/// Structured listing request passed to [`crate::RemoteDrive::list_children`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub parent_id: Option<String>,
    pub name: Option<String>,
    pub include_files: bool,
    pub include_folders: bool,
    pub page_size: u32,
    /// Follow continuation tokens until every page has been read
    pub recursive: bool,
}

impl ListQuery {
    /// Every child of `parent_id`, all pages
    pub fn children(parent_id: impl Into<String>) -> Self {
        Self {
            parent_id: Some(parent_id.into()),
            name: None,
            include_files: true,
            include_folders: true,
            page_size: 100,
            recursive: true,
        }
    }

    /// At most one child of `parent_id` named `name`
    pub fn named(parent_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            parent_id: Some(parent_id.into()),
            name: Some(name.into()),
            include_files: true,
            include_folders: true,
            page_size: 1,
            recursive: false,
        }
    }

    pub fn folders_only(mut self) -> Self {
        self.include_files = false;
        self.include_folders = true;
        self
    }

    pub fn files_only(mut self) -> Self {
        self.include_files = true;
        self.include_folders = false;
        self
    }
}

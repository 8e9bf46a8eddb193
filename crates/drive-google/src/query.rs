use drive_remote::item::{FOLDER_MIME, SHORTCUT_MIME};
use drive_remote::{ListQuery, RemoteError};

/// Quote a value for use inside a Drive search expression
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Build the `q` parameter for a files.list call
pub fn build_query(query: &ListQuery) -> Result<String, RemoteError> {
    let name = query.name.as_deref().filter(|n| !n.is_empty());
    let parent = query.parent_id.as_deref().filter(|p| !p.is_empty());

    if name.is_none() && parent.is_none() {
        return Err(RemoteError::InvalidRequest(
            "a name or a parent folder is required".into(),
        ));
    }

    let mut q = String::from("trashed = false");
    match (query.include_files, query.include_folders) {
        (true, true) => {}
        (true, false) => q.push_str(&format!(" and mimeType != {}", quote(FOLDER_MIME))),
        (false, true) => q.push_str(&format!(" and mimeType = {}", quote(FOLDER_MIME))),
        (false, false) => {
            return Err(RemoteError::InvalidRequest(
                "query excludes both files and folders".into(),
            ))
        }
    }
    if let Some(name) = name {
        q.push_str(&format!(" and name = {}", quote(name)));
    }
    if let Some(parent) = parent {
        q.push_str(&format!(" and {} in parents", quote(parent)));
    }
    q.push_str(&format!(" and mimeType != {}", quote(SHORTCUT_MIME)));
    Ok(q)
}

/// Extract the folder id from a share link, or pass a bare id through
pub fn parse_folder_id(link: &str) -> Result<String, RemoteError> {
    let link = link.trim().trim_end_matches('/');
    let last = link.rsplit('/').next().unwrap_or(link);
    let id = last.split("?resourcekey=").next().unwrap_or(last);
    let id = id.split('?').next().unwrap_or(id);
    if id.is_empty() {
        return Err(RemoteError::InvalidRequest(
            "a root folder must be provided".into(),
        ));
    }
    Ok(id.to_string())
}

use std::time::Duration;

use chrono::{DateTime, Utc};
use drive_remote::RemoteItem;

const SIZE_UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

pub const FOLDER_ICON: char = '\u{1F4C1}';
pub const FILE_ICON: char = '\u{1F4C4}';

/// Longest name shown in a listing before it is cut
const MAX_NAME_CHARS: usize = 42;

/// Human readable size in base-1024 units, rounded to two decimals.
/// Whole values keep one decimal: `1.0 MB`, `512.0 B`.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut unit = 0;
    let mut scaled = bytes as f64;
    while scaled >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }
    let rounded = (scaled * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{:.1} {}", rounded, SIZE_UNITS[unit])
    } else {
        format!("{} {}", rounded, SIZE_UNITS[unit])
    }
}

/// Name as shown in a listing: files lose their extension, long names are cut
pub fn display_name(name: &str, is_file: bool) -> String {
    let name = if is_file {
        name.rsplit_once('.').map_or(name, |(stem, _)| stem)
    } else {
        name
    };
    if name.chars().count() <= MAX_NAME_CHARS {
        name.to_string()
    } else {
        let cut: String = name.chars().take(MAX_NAME_CHARS - 1).collect();
        format!("{}...", cut)
    }
}

/// Upper-cased extension for a MIME type, `Folder` for folders
pub fn kind_label(item: &RemoteItem) -> String {
    if item.is_folder() {
        return "Folder".to_string();
    }
    let Some(extensions) = mime_guess::get_mime_extensions_str(&item.mime_type) else {
        return "FILE".to_string();
    };
    let own = item
        .name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| extensions.contains(&ext.as_str()));
    own.or_else(|| extensions.first().map(|e| e.to_string()))
        .map(|e| e.to_ascii_uppercase())
        .unwrap_or_else(|| "FILE".to_string())
}

/// One listing row: (icon + name, size, kind)
pub fn listing_row(item: &RemoteItem) -> (String, String, String) {
    let folder = item.is_folder();
    let icon = if folder { FOLDER_ICON } else { FILE_ICON };
    let name = format!("{} {}", icon, display_name(&item.name, !folder));
    let size = if folder {
        "--".to_string()
    } else {
        format_size(item.size.unwrap_or(0))
    };
    (name, size, kind_label(item))
}

/// `<t:..:R>` relative timestamp, or `never`
pub fn expiry_text(now: DateTime<Utc>, expires_in: Option<Duration>) -> String {
    match expires_in {
        Some(after) => {
            let at = i64::try_from(after.as_secs())
                .ok()
                .and_then(|secs| now.timestamp().checked_add(secs))
                .unwrap_or(i64::MAX);
            format!("<t:{}:R>", at)
        }
        None => "never".to_string(),
    }
}

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use drive_remote::{RemoteDrive, RemoteError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::CommandError;
use crate::scratch::ScratchDir;

const OCTET_STREAM: &str = "application/octet-stream";

/// Longest finite timeout accepted: one year
pub const MAX_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

pub const NESTED_FOLDER_WARNING: &str = "Please ensure that there are no folders inside of the zip file, as they and their contents will not be uploaded.";

/// How long a downloaded file or shared link stays available
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShareTimeout {
    After(Duration),
    Never,
}

impl ShareTimeout {
    /// Seconds as a number, or `inf`/`infinity`/`never`
    pub fn parse(raw: &str) -> Result<Self, CommandError> {
        let raw = raw.trim();
        match raw.to_ascii_lowercase().as_str() {
            "inf" | "infinity" | "never" => return Ok(ShareTimeout::Never),
            _ => {}
        }
        let secs: f64 = raw
            .parse()
            .map_err(|_| CommandError::InvalidArgument(format!("`{}` is not a valid timeout.", raw)))?;
        if secs.is_infinite() && secs > 0.0 {
            return Ok(ShareTimeout::Never);
        }
        let invalid = || CommandError::InvalidArgument(format!("`{}` is not a valid timeout.", raw));
        if !secs.is_finite() || secs < 0.0 {
            return Err(invalid());
        }
        let after = Duration::try_from_secs_f64(secs).map_err(|_| invalid())?;
        if after > MAX_TIMEOUT {
            return Err(CommandError::InvalidArgument(format!(
                "`{}` is too long; use at most {} seconds or `inf`.",
                raw,
                MAX_TIMEOUT.as_secs()
            )));
        }
        Ok(ShareTimeout::After(after))
    }

    pub fn duration(self) -> Option<Duration> {
        match self {
            ShareTimeout::After(d) => Some(d),
            ShareTimeout::Never => None,
        }
    }
}

/// What an upload did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub uploaded: Vec<String>,
    /// Directories inside an archive that were not uploaded
    pub skipped: usize,
    pub archive: bool,
}

impl UploadReport {
    pub fn message(&self) -> String {
        if !self.archive {
            let name = self.uploaded.first().map(String::as_str).unwrap_or_default();
            return format!("File `{}` uploaded!", name);
        }
        let mut out = String::new();
        if self.skipped > 0 {
            if self.uploaded.is_empty() {
                return NESTED_FOLDER_WARNING.to_string();
            }
            out.push_str(NESTED_FOLDER_WARNING);
            out.push('\n');
        }
        let plural = if self.uploaded.len() == 1 { "" } else { "s" };
        out.push_str(&format!(
            "File{} `{}` uploaded!",
            plural,
            self.uploaded.join(", ")
        ));
        out
    }
}

pub fn is_zip(filename: &str, content_type: Option<&str>) -> bool {
    if content_type.is_some_and(|ct| ct.contains("zip")) {
        return true;
    }
    mime_guess::from_path(filename)
        .first_raw()
        .is_some_and(|m| m.contains("zip"))
}

pub fn guess_mime(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_raw()
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

struct Extracted {
    files: Vec<(String, Bytes)>,
    skipped: usize,
}

/// Unpack an archive and read back its top-level files. Runs on the
/// blocking pool; the scratch dir is gone when this returns.
fn extract_top_level(data: Bytes) -> anyhow::Result<Extracted> {
    let scratch = ScratchDir::new()?;
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
    archive.extract(scratch.path())?;
    read_top_level(scratch.path())
}

fn read_top_level(dir: &Path) -> anyhow::Result<Extracted> {
    let mut files = Vec::new();
    let mut skipped = 0;
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        if entry.file_type()?.is_dir() {
            skipped += 1;
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let data = std::fs::read(entry.path())?;
        files.push((name, Bytes::from(data)));
    }
    Ok(Extracted { files, skipped })
}

/// Upload a chat attachment into `parent_id`. A zip archive is unpacked and
/// its top-level files uploaded one by one; anything that is not a readable
/// archive is uploaded as is.
pub async fn upload_attachment(
    drive: &dyn RemoteDrive,
    parent_id: &str,
    filename: &str,
    content_type: Option<&str>,
    data: Bytes,
) -> Result<UploadReport, RemoteError> {
    if is_zip(filename, content_type) {
        let archive = data.clone();
        let extracted = tokio::task::spawn_blocking(move || extract_top_level(archive)).await;
        match extracted {
            Ok(Ok(extracted)) => {
                let mut report = UploadReport {
                    skipped: extracted.skipped,
                    archive: true,
                    ..Default::default()
                };
                for (name, bytes) in extracted.files {
                    let mime = guess_mime(&name);
                    let stored = drive.upload_file(bytes, &name, &mime, parent_id).await?;
                    report.uploaded.push(stored);
                }
                info!(
                    "uploaded {} file(s) from {}, skipped {} folder(s)",
                    report.uploaded.len(),
                    filename,
                    report.skipped
                );
                return Ok(report);
            }
            Ok(Err(e)) => debug!("{} is not a usable archive ({:#}), uploading as is", filename, e),
            Err(e) => warn!("archive extraction task failed: {}", e),
        }
    }

    let mime = content_type
        .map(str::to_string)
        .unwrap_or_else(|| guess_mime(filename));
    let stored = drive.upload_file(data, filename, &mime, parent_id).await?;
    info!("uploaded {}", stored);
    Ok(UploadReport {
        uploaded: vec![stored],
        ..Default::default()
    })
}

/// Revoke a public link once `after` has elapsed. Only process shutdown
/// cancels the wait.
pub fn schedule_revoke(drive: Arc<dyn RemoteDrive>, file_id: String, after: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        match drive.revoke_link(&file_id).await {
            Ok(()) => info!("revoked public link for {}", file_id),
            Err(e) => warn!("failed to revoke public link for {}: {:#}", file_id, e),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDrive;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn zip_of(entries: &[(&str, &[u8])], dirs: &[&str]) -> Bytes {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for dir in dirs {
            writer.add_directory(*dir, SimpleFileOptions::default()).unwrap();
        }
        for (name, data) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        Bytes::from(writer.finish().unwrap().into_inner())
    }

    #[test]
    fn test_timeout_parse() {
        assert_eq!(
            ShareTimeout::parse("60").unwrap(),
            ShareTimeout::After(Duration::from_secs(60))
        );
        assert_eq!(
            ShareTimeout::parse("1.5").unwrap(),
            ShareTimeout::After(Duration::from_millis(1500))
        );
        assert_eq!(ShareTimeout::parse("inf").unwrap(), ShareTimeout::Never);
        assert_eq!(ShareTimeout::parse("Infinity").unwrap(), ShareTimeout::Never);
        assert_eq!(ShareTimeout::parse("never").unwrap(), ShareTimeout::Never);
        assert!(ShareTimeout::parse("-1").is_err());
        assert!(ShareTimeout::parse("soon").is_err());
        assert!(ShareTimeout::parse("NaN").is_err());
        assert!(ShareTimeout::parse("1e30").is_err());
    }

    #[test]
    fn test_timeout_too_large() {
        assert!(ShareTimeout::parse("1e300").is_err());
        let limit = MAX_TIMEOUT.as_secs().to_string();
        assert_eq!(
            ShareTimeout::parse(&limit).unwrap(),
            ShareTimeout::After(MAX_TIMEOUT)
        );
        let over = (MAX_TIMEOUT.as_secs() + 1).to_string();
        assert!(ShareTimeout::parse(&over).is_err());
    }

    #[test]
    fn test_report_messages() {
        let single = UploadReport {
            uploaded: vec!["a.pdf".into()],
            ..Default::default()
        };
        assert_eq!(single.message(), "File `a.pdf` uploaded!");

        let many = UploadReport {
            uploaded: vec!["a".into(), "b".into()],
            skipped: 0,
            archive: true,
        };
        assert_eq!(many.message(), "Files `a, b` uploaded!");

        let warned = UploadReport {
            uploaded: vec!["a".into()],
            skipped: 1,
            archive: true,
        };
        assert_eq!(
            warned.message(),
            format!("{}\nFile `a` uploaded!", NESTED_FOLDER_WARNING)
        );

        let only_dirs = UploadReport {
            uploaded: vec![],
            skipped: 2,
            archive: true,
        };
        assert_eq!(only_dirs.message(), NESTED_FOLDER_WARNING);
    }

    #[test]
    fn test_zip_detection() {
        assert!(is_zip("bundle.zip", None));
        assert!(is_zip("bundle", Some("application/zip")));
        assert!(!is_zip("report.pdf", Some("application/pdf")));
    }

    #[tokio::test]
    async fn test_plain_file_upload() {
        let drive = FakeDrive::new();
        let report = upload_attachment(
            &drive,
            "root",
            "a.pdf",
            Some("application/pdf"),
            Bytes::from_static(b"%PDF"),
        )
        .await
        .unwrap();
        assert_eq!(report.uploaded, vec!["a.pdf"]);
        assert!(!report.archive);
        assert_eq!(drive.names_in("root"), vec!["a.pdf"]);
    }

    #[tokio::test]
    async fn test_zip_uploads_top_level_files_only() {
        let drive = FakeDrive::new();
        let data = zip_of(
            &[("b.txt", b"b"), ("a.png", b"a"), ("inner/c.txt", b"c")],
            &["inner/"],
        );
        let report = upload_attachment(&drive, "root", "bundle.zip", Some("application/zip"), data)
            .await
            .unwrap();
        assert!(report.archive);
        assert_eq!(report.uploaded, vec!["a.png", "b.txt"]);
        assert_eq!(report.skipped, 1);
        let uploads = drive.uploads.lock().unwrap();
        assert_eq!(uploads.get("a.png").map(String::as_str), Some("image/png"));
        assert_eq!(uploads.get("b.txt").map(String::as_str), Some("text/plain"));
        assert!(!uploads.contains_key("c.txt"));
    }

    #[tokio::test]
    async fn test_corrupt_zip_uploads_as_single_file() {
        let drive = FakeDrive::new();
        let report = upload_attachment(
            &drive,
            "root",
            "broken.zip",
            Some("application/zip"),
            Bytes::from_static(b"not a zip"),
        )
        .await
        .unwrap();
        assert!(!report.archive);
        assert_eq!(report.uploaded, vec!["broken.zip"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_revoke_waits_for_timeout() {
        let drive = Arc::new(FakeDrive::new());
        let handle = schedule_revoke(drive.clone(), "f1".into(), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(drive.revoked.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        handle.await.unwrap();
        assert_eq!(*drive.revoked.lock().unwrap(), vec!["f1".to_string()]);
    }
}

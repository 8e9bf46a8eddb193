use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::RemoteError;
use crate::item::RemoteItem;
use crate::query::ListQuery;

/// Outcome of fetching a file for delivery to a chat user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieved {
    /// Small enough to attach directly
    Inline { name: String, data: Bytes },
    /// Too large to attach; a public link was granted and must be revoked later
    Link { file_id: String, name: String, url: String },
    NotFound,
}

#[async_trait]
pub trait RemoteDrive: Send + Sync {
    /// Whether a usable remote session exists
    fn is_authenticated(&self) -> bool;

    /// Metadata of the configured root folder
    async fn root(&self) -> Result<RemoteItem, RemoteError>;

    async fn list_children(&self, query: &ListQuery) -> Result<Vec<RemoteItem>, RemoteError>;

    /// Create a folder and return its id
    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<String, RemoteError>;

    /// Upload a file and return the name the service stored it under
    async fn upload_file(
        &self,
        data: Bytes,
        name: &str,
        mime_type: &str,
        parent_id: &str,
    ) -> Result<String, RemoteError>;

    async fn download_file(&self, file_id: &str) -> Result<Bytes, RemoteError>;

    /// Make a file readable by anyone holding the link and return the link
    async fn grant_public_read(
        &self,
        file_id: &str,
        expires_in: Option<Duration>,
    ) -> Result<String, RemoteError>;

    async fn revoke_link(&self, file_id: &str) -> Result<(), RemoteError>;

    /// Fetch `name` from `parent_id`: inline bytes when smaller than
    /// `size_limit`, otherwise a public link.
    async fn download_or_link(
        &self,
        name: &str,
        parent_id: &str,
        size_limit: u64,
        expires_in: Option<Duration>,
    ) -> Result<Retrieved, RemoteError> {
        let found = self
            .list_children(&ListQuery::named(parent_id, name).files_only())
            .await?;
        let Some(item) = found.into_iter().next() else {
            return Ok(Retrieved::NotFound);
        };

        if item.size.unwrap_or(0) >= size_limit {
            debug!("{} exceeds {} bytes, sharing by link", item.name, size_limit);
            let url = self.grant_public_read(&item.id, expires_in).await?;
            return Ok(Retrieved::Link {
                file_id: item.id,
                name: item.name,
                url,
            });
        }

        let data = self.download_file(&item.id).await?;
        Ok(Retrieved::Inline {
            name: item.name,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct OneFile {
        item: Option<RemoteItem>,
        granted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RemoteDrive for OneFile {
        fn is_authenticated(&self) -> bool {
            true
        }
        async fn root(&self) -> Result<RemoteItem, RemoteError> {
            Ok(RemoteItem::folder("root", "R"))
        }
        async fn list_children(&self, query: &ListQuery) -> Result<Vec<RemoteItem>, RemoteError> {
            assert!(!query.include_folders);
            Ok(self
                .item
                .iter()
                .filter(|i| Some(&i.name) == query.name.as_ref())
                .cloned()
                .collect())
        }
        async fn create_folder(&self, _: &str, _: &str) -> Result<String, RemoteError> {
            unreachable!()
        }
        async fn upload_file(&self, _: Bytes, _: &str, _: &str, _: &str) -> Result<String, RemoteError> {
            unreachable!()
        }
        async fn download_file(&self, _: &str) -> Result<Bytes, RemoteError> {
            Ok(Bytes::from_static(b"payload"))
        }
        async fn grant_public_read(&self, file_id: &str, _: Option<Duration>) -> Result<String, RemoteError> {
            self.granted.lock().unwrap().push(file_id.to_string());
            Ok(format!("https://example.test/{}", file_id))
        }
        async fn revoke_link(&self, _: &str) -> Result<(), RemoteError> {
            Ok(())
        }
    }

    fn drive(size: u64) -> OneFile {
        OneFile {
            item: Some(RemoteItem::file("f1", "a.pdf", "application/pdf", size)),
            granted: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_small_file_is_inline() {
        let d = drive(7);
        let got = d.download_or_link("a.pdf", "root", 100, None).await.unwrap();
        assert_eq!(
            got,
            Retrieved::Inline {
                name: "a.pdf".into(),
                data: Bytes::from_static(b"payload")
            }
        );
        assert!(d.granted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_limit_is_inclusive_for_links() {
        let d = drive(100);
        let got = d.download_or_link("a.pdf", "root", 100, None).await.unwrap();
        assert!(matches!(got, Retrieved::Link { ref file_id, .. } if file_id == "f1"));
        assert_eq!(*d.granted.lock().unwrap(), vec!["f1".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let d = drive(1);
        let got = d.download_or_link("b.pdf", "root", 100, None).await.unwrap();
        assert_eq!(got, Retrieved::NotFound);
    }
}

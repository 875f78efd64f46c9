use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::fs::{create_dir_all, metadata, read_dir, File};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::trace;

use crate::resource::{ExternalResourceMetaData, ExternalResourceName, ExternalResourceRepository};
use crate::util::blob::Blob;

/// Transport for `file:` repositories, i.e. repositories on a local or mounted file system
pub struct FileResourceRepository {}

impl FileResourceRepository {
    pub fn new() -> FileResourceRepository {
        FileResourceRepository {}
    }

    pub fn to_path(location: &ExternalResourceName) -> PathBuf {
        let uri = location.uri();
        let path = uri.strip_prefix("file://").unwrap_or(&uri);
        PathBuf::from(path)
    }
}
impl Default for FileResourceRepository {
    fn default() -> Self {
        FileResourceRepository::new()
    }
}

#[async_trait]
impl ExternalResourceRepository for FileResourceRepository {
    async fn get_metadata(&self, location: &ExternalResourceName) -> anyhow::Result<Option<ExternalResourceMetaData>> {
        let path = Self::to_path(location);
        trace!("checking file {}", path.display());
        match metadata(&path).await {
            Ok(m) if m.is_file() => Ok(Some(ExternalResourceMetaData {
                content_length: Some(m.len()),
                ..Default::default()
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, location: &ExternalResourceName) -> anyhow::Result<Option<Blob>> {
        let path = Self::to_path(location);
        trace!("reading file {}", path.display());
        let file = match File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if file.metadata().await?.is_dir() {
            return Ok(None);
        }

        let stream = ReaderStream::new(file)
            .map(|chunk| chunk.map_err(anyhow::Error::from));
        Ok(Some(Blob {
            data: Box::pin(stream),
            md5: None,
            sha1: None,
        }))
    }

    async fn list(&self, parent: &ExternalResourceName) -> anyhow::Result<Option<Vec<String>>> {
        let path = Self::to_path(parent);
        let mut entries = match read_dir(&path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut result = vec![];
        while let Some(entry) = entries.next_entry().await? {
            result.push(entry.file_name().to_string_lossy().to_string());
        }
        result.sort();
        Ok(Some(result))
    }

    async fn put(&self, location: &ExternalResourceName, content: Bytes) -> anyhow::Result<()> {
        let path = Self::to_path(location);
        if let Some(parent) = path.parent() {
            create_dir_all(parent).await?;
        }
        let mut file = File::create(&path).await?;
        file.write_all(&content).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn root(dir: &tempfile::TempDir) -> ExternalResourceName {
        ExternalResourceName::new(format!("file://{}", dir.path().display()))
    }

    #[tokio::test]
    async fn test_put_get_list() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileResourceRepository::new();
        let location = root(&dir).with_path("org/example/foo/1.0/foo-1.0.jar");

        assert!(repo.get_metadata(&location).await.unwrap().is_none());
        assert!(repo.get(&location).await.unwrap().is_none());

        repo.put(&location, Bytes::from_static(b"jar content")).await.unwrap();

        assert_eq!(repo.get_metadata(&location).await.unwrap().unwrap().content_length, Some(11));
        let content = repo.get(&location).await.unwrap().unwrap().into_bytes().await.unwrap();
        assert_eq!(&content[..], b"jar content");

        let listed = repo.list(&root(&dir).with_path("org/example/foo")).await.unwrap();
        assert_eq!(listed, Some(vec!["1.0".to_string()]));
        assert_eq!(repo.list(&root(&dir).with_path("org/example/bar")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_directory_is_not_a_resource() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileResourceRepository::new();
        assert!(repo.get_metadata(&root(&dir)).await.unwrap().is_none());
    }
}

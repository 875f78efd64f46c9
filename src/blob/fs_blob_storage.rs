use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tokio::fs::{create_dir_all, read_dir, remove_dir_all, remove_file, rename, try_exists, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{error, trace, warn};
use uuid::Uuid;

use crate::blob::blob_storage::{ArtifactCacheKey, BlobStorage, LocallyAvailableResource};
use crate::util::blob::Blob;

const METADATA_FILE: &str = "metadata.json";

#[derive(Serialize, Deserialize)]
struct BlobMetaData {
    sha1: [u8;20],
    md5: [u8;16],
}

/// Stores blobs under `<root>/<repository-id>/<group>/<module>/<version>/<sha1>/<file name>`, with
///  a `metadata.json` sidecar in each sha1 directory.
///
/// Content is first written to a `<uuid>.inserting` directory next to its final place and renamed
///  when complete, so readers never see partial files. The SHA1 of a stored file is re-verified on
///  every lookup, and corrupt entries are removed.
pub struct FsBlobStorage {
    root: PathBuf,
}
impl FsBlobStorage {
    pub fn new(root: impl Into<PathBuf>) -> FsBlobStorage {
        FsBlobStorage {
            root: root.into(),
        }
    }

    fn version_directory(&self, key: &ArtifactCacheKey) -> PathBuf {
        let mut result = self.root.clone();
        result.push(&key.repository_id);
        result.push(&key.group);
        result.push(&key.module);
        result.push(&key.version);
        result
    }

    /// all content directories in the version directory that contain a file with the key's name
    async fn candidates(&self, key: &ArtifactCacheKey) -> anyhow::Result<Vec<PathBuf>> {
        let version_directory = self.version_directory(key);
        let mut entries = match read_dir(&version_directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut result = vec![];
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.len() != 40 || !name.chars().all(|c| c.is_ascii_hexdigit()) {
                continue;
            }
            let mut file = entry.path();
            file.push(&key.file_name);
            if try_exists(&file).await? {
                result.push(file);
            }
        }
        result.sort();
        Ok(result)
    }

    async fn do_insert(temp_directory: &Path, key: &ArtifactCacheKey, data: Blob) -> anyhow::Result<BlobMetaData> {
        let mut data_path = temp_directory.to_path_buf();
        data_path.push(&key.file_name);

        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&data_path)
            .await?;

        let mut sha1_hasher: Sha1 = Default::default();
        let mut md5_hasher = md5::Context::new();

        let mut stream = data.data;
        while let Some(chunk) = stream.next().await {
            let bytes = chunk?;
            sha1_hasher.update(&bytes);
            md5_hasher.consume(&bytes);
            file.write_all(&bytes).await?;
        }
        file.flush().await?;

        let metadata = BlobMetaData {
            sha1: sha1_hasher.finalize().into(),
            md5: md5_hasher.compute().into(),
        };

        if let Some(expected) = data.sha1 {
            if expected != metadata.sha1 {
                return Err(anyhow::anyhow!("content of {} does not match its announced SHA1 {}", key, hex::encode(expected)));
            }
        }

        let metadata_json = serde_json::to_string(&metadata)?;
        let mut metadata_path = temp_directory.to_path_buf();
        metadata_path.push(METADATA_FILE);
        let mut metadata_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(metadata_path)
            .await?;
        metadata_file.write_all(metadata_json.as_bytes()).await?;

        Ok(metadata)
    }

    /// moves a completely written temp directory to its content addressed place
    async fn publish(temp_directory: &Path, content_directory: &Path, file_name: &str) -> anyhow::Result<()> {
        if !try_exists(content_directory).await? {
            rename(temp_directory, content_directory).await?;
            return Ok(());
        }

        // same content under a different file name is already there: add this file name
        let mut target = content_directory.to_path_buf();
        target.push(file_name);
        if !try_exists(&target).await? {
            let mut source = temp_directory.to_path_buf();
            source.push(file_name);
            rename(source, target).await?;
        }
        remove_dir_all(temp_directory).await?;
        Ok(())
    }
}

pub async fn sha1_of_file(path: &Path) -> anyhow::Result<[u8; 20]> {
    let mut stream = ReaderStream::new(File::open(path).await?);
    let mut hasher: Sha1 = Default::default();
    while let Some(chunk) = stream.next().await {
        hasher.update(&chunk?);
    }
    Ok(hasher.finalize().into())
}

#[async_trait]
impl BlobStorage for FsBlobStorage {
    async fn get(&self, key: &ArtifactCacheKey) -> anyhow::Result<Option<LocallyAvailableResource>> {
        for file in self.candidates(key).await? {
            trace!("checking cached file {}", file.display());
            let expected = file.parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            let actual = sha1_of_file(&file).await?;
            if hex::encode(actual) == expected {
                return Ok(Some(LocallyAvailableResource {
                    file,
                    sha1: actual,
                }));
            }

            warn!("cached file {} is corrupt, removing it", file.display());
            remove_file(&file).await?;
        }
        Ok(None)
    }

    async fn insert(&self, key: &ArtifactCacheKey, data: Blob) -> anyhow::Result<LocallyAvailableResource> {
        let version_directory = self.version_directory(key);
        let mut temp_directory = version_directory.clone();
        temp_directory.push(format!("{}.inserting", Uuid::new_v4().as_hyphenated()));

        trace!("inserting {} via {}", key, temp_directory.display());
        create_dir_all(&temp_directory).await?;

        let metadata = match Self::do_insert(&temp_directory, key, data).await {
            Ok(metadata) => metadata,
            Err(e) => {
                if let Err(cleanup) = remove_dir_all(&temp_directory).await {
                    error!("error cleaning up {} after failed attempt to insert: {}", temp_directory.display(), cleanup);
                }
                return Err(e);
            }
        };

        let mut content_directory = version_directory;
        content_directory.push(hex::encode(metadata.sha1));
        Self::publish(&temp_directory, &content_directory, &key.file_name).await?;

        let mut file = content_directory;
        file.push(&key.file_name);
        Ok(LocallyAvailableResource {
            file,
            sha1: metadata.sha1,
        })
    }

    async fn delete(&self, key: &ArtifactCacheKey) -> anyhow::Result<bool> {
        let candidates = self.candidates(key).await?;
        for file in &candidates {
            trace!("deleting cached file {}", file.display());
            remove_file(file).await?;

            // drop the content directory once only the sidecar is left
            if let Some(content_directory) = file.parent() {
                let mut remaining = read_dir(content_directory).await?;
                let mut only_metadata = true;
                while let Some(entry) = remaining.next_entry().await? {
                    if entry.file_name() != METADATA_FILE {
                        only_metadata = false;
                    }
                }
                if only_metadata {
                    remove_dir_all(content_directory).await?;
                }
            }
        }
        Ok(!candidates.is_empty())
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;
    use super::*;

    fn key(file_name: &str) -> ArtifactCacheKey {
        ArtifactCacheKey {
            repository_id: "repo".to_string(),
            group: "org.example".to_string(),
            module: "foo".to_string(),
            version: "1.0".to_string(),
            file_name: file_name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsBlobStorage::new(dir.path());

        assert!(storage.get(&key("foo-1.0.jar")).await.unwrap().is_none());

        let inserted = storage.insert(&key("foo-1.0.jar"), Blob::from_bytes(Bytes::from_static(b"abc"))).await.unwrap();
        assert_eq!(inserted.sha1_hex(), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert!(inserted.file.ends_with("repo/org.example/foo/1.0/a9993e364706816aba3e25717850c26c9cd0d89d/foo-1.0.jar"));
        assert_eq!(std::fs::read(&inserted.file).unwrap(), b"abc");

        let found = storage.get(&key("foo-1.0.jar")).await.unwrap().unwrap();
        assert_eq!(found, inserted);

        assert!(storage.delete(&key("foo-1.0.jar")).await.unwrap());
        assert!(storage.get(&key("foo-1.0.jar")).await.unwrap().is_none());
        assert!(!storage.delete(&key("foo-1.0.jar")).await.unwrap());
    }

    #[tokio::test]
    async fn test_same_content_under_two_names() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsBlobStorage::new(dir.path());

        let a = storage.insert(&key("a.jar"), Blob::from_bytes(Bytes::from_static(b"same"))).await.unwrap();
        let b = storage.insert(&key("b.jar"), Blob::from_bytes(Bytes::from_static(b"same"))).await.unwrap();
        assert_eq!(a.file.parent(), b.file.parent());
        assert!(storage.get(&key("a.jar")).await.unwrap().is_some());
        assert!(storage.get(&key("b.jar")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsBlobStorage::new(dir.path());

        let inserted = storage.insert(&key("foo-1.0.jar"), Blob::from_bytes(Bytes::from_static(b"abc"))).await.unwrap();
        std::fs::write(&inserted.file, b"tampered").unwrap();

        assert!(storage.get(&key("foo-1.0.jar")).await.unwrap().is_none());
        assert!(!inserted.file.exists());
    }

    #[tokio::test]
    async fn test_announced_sha1_mismatch_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsBlobStorage::new(dir.path());

        let mut blob = Blob::from_bytes(Bytes::from_static(b"abc"));
        blob.sha1 = Some([0u8; 20]);
        assert!(storage.insert(&key("foo-1.0.jar"), blob).await.is_err());

        let version_directory = dir.path().join("repo/org.example/foo/1.0");
        assert_eq!(std::fs::read_dir(version_directory).unwrap().count(), 0);
    }
}

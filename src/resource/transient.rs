use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use sha1::{Digest, Sha1};

use crate::resource::{ExternalResourceMetaData, ExternalResourceName, ExternalResourceRepository};
use crate::util::blob::Blob;

/// in-memory repository, neither optimized nor particularly robust - for testing purposes
///
/// Resources are keyed by their full URI. Calls are counted per operation, and URIs can be marked
///  as failing to simulate broken transports.
pub struct TransientRepository {
    data: Mutex<BTreeMap<String, Bytes>>,
    failing: Mutex<HashSet<String>>,
    gets: Mutex<Vec<String>>,
    exists_calls: AtomicUsize,
    list_calls: AtomicUsize,
    puts: Mutex<Vec<String>>,
}
impl TransientRepository {
    pub fn new() -> TransientRepository {
        TransientRepository {
            data: Default::default(),
            failing: Default::default(),
            gets: Default::default(),
            exists_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            puts: Default::default(),
        }
    }

    pub fn insert(&self, uri: impl Into<String>, content: impl Into<Bytes>) {
        self.data.lock().unwrap().insert(uri.into(), content.into());
    }

    /// all operations on this URI fail with a transport error from now on
    pub fn fail(&self, uri: impl Into<String>) {
        self.failing.lock().unwrap().insert(uri.into());
    }

    pub fn content(&self, uri: &str) -> Option<Bytes> {
        self.data.lock().unwrap().get(uri).cloned()
    }

    /// URIs passed to `get`, in call order
    pub fn gets(&self) -> Vec<String> {
        self.gets.lock().unwrap().clone()
    }

    pub fn get_count(&self, uri: &str) -> usize {
        self.gets.lock().unwrap().iter().filter(|g| *g == uri).count()
    }

    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// URIs passed to `put`, in call order
    pub fn puts(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }

    fn check_failing(&self, uri: &str) -> anyhow::Result<()> {
        if self.failing.lock().unwrap().contains(uri) {
            return Err(anyhow::anyhow!("connection reset while accessing {}", uri));
        }
        Ok(())
    }
}
impl Default for TransientRepository {
    fn default() -> Self {
        TransientRepository::new()
    }
}

#[async_trait]
impl ExternalResourceRepository for TransientRepository {
    async fn get_metadata(&self, location: &ExternalResourceName) -> anyhow::Result<Option<ExternalResourceMetaData>> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        let uri = location.uri();
        self.check_failing(&uri)?;

        Ok(self.data.lock().unwrap()
            .get(&uri)
            .map(|content| ExternalResourceMetaData {
                content_length: Some(content.len() as u64),
                sha1: Some(Sha1::digest(content).into()),
                ..Default::default()
            }))
    }

    async fn get(&self, location: &ExternalResourceName) -> anyhow::Result<Option<Blob>> {
        let uri = location.uri();
        self.gets.lock().unwrap().push(uri.clone());
        self.check_failing(&uri)?;

        let content = self.data.lock().unwrap().get(&uri).cloned();
        Ok(content.map(Blob::from_bytes))
    }

    async fn list(&self, parent: &ExternalResourceName) -> anyhow::Result<Option<Vec<String>>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut prefix = parent.uri();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        self.check_failing(&prefix)?;

        let data = self.data.lock().unwrap();
        let mut children: Vec<String> = data.keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .filter(|child| !child.is_empty())
            .map(|child| child.to_string())
            .collect();
        children.sort();
        children.dedup();

        if children.is_empty() {
            Ok(None)
        }
        else {
            Ok(Some(children))
        }
    }

    async fn put(&self, location: &ExternalResourceName, content: Bytes) -> anyhow::Result<()> {
        let uri = location.uri();
        self.puts.lock().unwrap().push(uri.clone());
        self.check_failing(&uri)?;
        self.data.lock().unwrap().insert(uri, content);
        Ok(())
    }
}

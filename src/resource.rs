pub mod caching;
pub mod file;
pub mod http;
pub mod transient;

use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use bytes::Bytes;

use crate::util::blob::Blob;

/// The location of a resource in a repository: a root URI (always with a trailing '/') and a
///  path relative to it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExternalResourceName {
    root: String,
    path: String,
}
impl ExternalResourceName {
    pub fn new(root: impl Into<String>) -> ExternalResourceName {
        let mut root = root.into();
        if !root.ends_with('/') {
            root.push('/');
        }
        ExternalResourceName {
            root,
            path: String::new(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn uri(&self) -> String {
        format!("{}{}", self.root, self.path)
    }

    /// the root of this name with a new path relative to it
    pub fn with_path(&self, path: &str) -> ExternalResourceName {
        ExternalResourceName {
            root: self.root.clone(),
            path: normalize(path.trim_start_matches('/')),
        }
    }

    /// treats the current path as a directory and resolves `relative` against it
    pub fn resolve(&self, relative: &str) -> ExternalResourceName {
        let joined = if self.path.is_empty() {
            relative.to_string()
        }
        else {
            format!("{}/{}", self.path.trim_end_matches('/'), relative)
        };
        self.with_path(&joined)
    }

    /// appends a suffix to the last path segment, e.g. `.sha1`
    pub fn append(&self, suffix: &str) -> ExternalResourceName {
        ExternalResourceName {
            root: self.root.clone(),
            path: format!("{}{}", self.path, suffix),
        }
    }
}
impl Display for ExternalResourceName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.root, self.path)
    }
}

/// removes '.' segments and resolves '..' segments
fn normalize(path: &str) -> String {
    if !path.split('/').any(|s| s == "." || s == "..") {
        return path.to_string();
    }

    let mut segments: Vec<&str> = vec![];
    for segment in path.split('/') {
        match segment {
            "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// What a cheap existence check reports about a resource
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExternalResourceMetaData {
    pub content_length: Option<u64>,
    pub sha1: Option<[u8; 20]>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// The transport to a repository.
///
/// 'Does not exist' is reported as `None`, transport failures as `Err`. Implementations handle
///  timeouts, retries and connection pooling themselves.
#[async_trait]
pub trait ExternalResourceRepository: Send + Sync {
    /// cheap existence check
    async fn get_metadata(&self, location: &ExternalResourceName) -> anyhow::Result<Option<ExternalResourceMetaData>>;

    async fn get(&self, location: &ExternalResourceName) -> anyhow::Result<Option<Blob>>;

    /// names of the children of a 'directory', if the transport can tell
    async fn list(&self, parent: &ExternalResourceName) -> anyhow::Result<Option<Vec<String>>>;

    async fn put(&self, location: &ExternalResourceName, content: Bytes) -> anyhow::Result<()>;
}

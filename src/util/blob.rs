use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures_core::Stream;

/// Content fetched from a repository, streamed, with whatever checksums the transport learned
///  about it along the way
pub struct Blob {
    pub data: Pin<Box<dyn Stream<Item = anyhow::Result<Bytes>> + Send + 'static>>,
    pub md5: Option<[u8;16]>,
    pub sha1: Option<[u8;20]>,
}
impl Blob {
    pub fn from_bytes(bytes: Bytes) -> Blob {
        Blob {
            data: Box::pin(futures::stream::once(async move { Ok::<_, anyhow::Error>(bytes) })),
            md5: None,
            sha1: None,
        }
    }

    /// drains the stream - only for small resources like checksum or maven-metadata.xml files
    pub async fn into_bytes(self) -> anyhow::Result<Bytes> {
        let mut data = self.data;
        let mut result = BytesMut::new();
        while let Some(chunk) = data.next().await {
            result.extend_from_slice(&chunk?);
        }
        Ok(result.freeze())
    }
}

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::{ready, Stream};
use pin_project_lite::pin_project;
use sha1::{Digest, Sha1};
use tracing::trace;

/// A checksum a server announced for a resource, e.g. in an `X-Checksum-Sha1` header, together
///  with the running digest of the content received so far
pub enum ExpectedChecksum {
    Sha1 { expected: [u8; 20], hasher: Sha1 },
    Md5 { expected: [u8; 16], context: md5::Context },
}
impl ExpectedChecksum {
    pub fn sha1(expected: [u8; 20]) -> ExpectedChecksum {
        ExpectedChecksum::Sha1 { expected, hasher: Sha1::new() }
    }

    pub fn md5(expected: [u8; 16]) -> ExpectedChecksum {
        ExpectedChecksum::Md5 { expected, context: md5::Context::new() }
    }

    fn algorithm(&self) -> &'static str {
        match self {
            ExpectedChecksum::Sha1 { .. } => "SHA-1",
            ExpectedChecksum::Md5 { .. } => "MD5",
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        match self {
            ExpectedChecksum::Sha1 { hasher, .. } => hasher.update(chunk),
            ExpectedChecksum::Md5 { context, .. } => context.consume(chunk),
        }
    }

    fn matches(&self) -> bool {
        trace!("verifying {} of received content", self.algorithm());
        match self {
            ExpectedChecksum::Sha1 { expected, hasher } => {
                let actual: [u8; 20] = hasher.clone().finalize().into();
                &actual == expected
            }
            ExpectedChecksum::Md5 { expected, context } => {
                let actual: [u8; 16] = context.clone().compute().into();
                &actual == expected
            }
        }
    }
}

pin_project! {
    /// Passes a byte stream through unchanged while digesting it, and verifies the digests once
    ///  the upstream is exhausted. A mismatch is reported as one trailing error item, so consumers
    ///  that write the stream to a temporary location discard it instead of committing it.
    ///
    /// After the first error, the upstream is not polled anymore.
    pub struct ChecksumVerifyingStream<S> {
        #[pin]
        upstream: S,
        checksums: Vec<ExpectedChecksum>,
        done: bool,
    }
}
impl<S> ChecksumVerifyingStream<S> {
    pub fn new(upstream: S, checksums: Vec<ExpectedChecksum>) -> ChecksumVerifyingStream<S> {
        ChecksumVerifyingStream {
            upstream,
            checksums,
            done: false,
        }
    }
}

impl<S, E> Stream for ChecksumVerifyingStream<S>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<anyhow::Error>,
{
    type Item = anyhow::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }

        match ready!(this.upstream.poll_next(cx)) {
            Some(Ok(chunk)) => {
                this.checksums.iter_mut().for_each(|c| c.update(&chunk));
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                *this.done = true;
                Poll::Ready(Some(Err(e.into())))
            }
            None => {
                *this.done = true;
                match this.checksums.iter().find(|c| !c.matches()) {
                    Some(mismatch) => Poll::Ready(Some(Err(anyhow::anyhow!("received content does not match the announced {} checksum", mismatch.algorithm())))),
                    None => Poll::Ready(None),
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // one more item for a possible mismatch
        let (lower, upper) = self.upstream.size_hint();
        (lower, upper.map(|u| u + 1))
    }
}

#[cfg(test)]
mod test {
    use futures::StreamExt;
    use rstest::*;

    use super::*;

    fn chunks(data: &[&'static str]) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
        futures::stream::iter(data.iter().map(|s| Ok(Bytes::from_static(s.as_bytes()))).collect::<Vec<_>>())
    }

    async fn collect<S: Stream<Item = anyhow::Result<Bytes>> + Unpin>(mut stream: S) -> (Vec<u8>, Option<String>) {
        let mut data = vec![];
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(c) => data.extend_from_slice(&c),
                Err(e) => return (data, Some(e.to_string())),
            }
        }
        (data, None)
    }

    #[rstest]
    #[case::no_checksum(vec![], None)]
    #[case::sha1(vec![ExpectedChecksum::sha1(Sha1::digest(b"hello world").into())], None)]
    #[case::md5(vec![ExpectedChecksum::md5(md5::compute(b"hello world").into())], None)]
    #[case::wrong_sha1(vec![ExpectedChecksum::sha1([0; 20])], Some("received content does not match the announced SHA-1 checksum"))]
    #[case::wrong_md5(vec![ExpectedChecksum::sha1(Sha1::digest(b"hello world").into()), ExpectedChecksum::md5([0; 16])], Some("received content does not match the announced MD5 checksum"))]
    #[tokio::test]
    async fn test_verification(#[case] checksums: Vec<ExpectedChecksum>, #[case] expected_error: Option<&str>) {
        let stream = ChecksumVerifyingStream::new(chunks(&["hello", " ", "world"]), checksums);
        let (data, error) = collect(Box::pin(stream)).await;

        assert_eq!(data, b"hello world");
        assert_eq!(error.as_deref(), expected_error);
    }

    #[tokio::test]
    async fn test_upstream_error_ends_stream() {
        let upstream = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"never seen")),
        ]);
        let mut stream = Box::pin(ChecksumVerifyingStream::new(upstream, vec![ExpectedChecksum::md5([0; 16])]));

        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}

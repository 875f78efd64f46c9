use async_trait::async_trait;
use bytes::Bytes;
use hex::FromHex;
use hyper::{Body, Client, Method, Request, Response, StatusCode, Uri};
use hyper::body::to_bytes;
use hyper::client::HttpConnector;
use hyper::header::{CONTENT_LENGTH, ETAG, HeaderMap, LAST_MODIFIED, USER_AGENT};
use hyper_tls::HttpsConnector;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

use crate::resource::{ExternalResourceMetaData, ExternalResourceName, ExternalResourceRepository};
use crate::util::blob::Blob;
use crate::util::checksum_stream::{ChecksumVerifyingStream, ExpectedChecksum};

lazy_static! {
    static ref HREF_REGEX: Regex = Regex::new(r#"(?i)<a\s[^>]*href\s*=\s*"([^"]+)""#).unwrap();
}

const USER_AGENT_VALUE: &str = concat!("arti-resolver/", env!("CARGO_PKG_VERSION"));

/// HTTP(S) transport. Downloads are checked against a SHA1 / MD5 hashcode if the server
///  announces one in a header.
///
/// Instances do HTTP connection caching internally, so keeping them alive has performance benefits.
pub struct HttpResourceRepository {
    client: Client<HttpsConnector<HttpConnector>>,
}
impl HttpResourceRepository {
    pub fn new() -> HttpResourceRepository {
        HttpResourceRepository {
            client: Client::builder()
                .build::<_, Body>(HttpsConnector::new()),
        }
    }

    async fn request(&self, method: Method, location: &str, body: Body) -> anyhow::Result<Response<Body>> {
        let request = Request::builder()
            .method(method)
            .uri(Uri::try_from(location)?)
            .header(USER_AGENT, USER_AGENT_VALUE)
            .body(body)?;

        trace!("{} {}", request.method(), request.uri());
        Ok(self.client.request(request).await?)
    }

    fn sha1_header(headers: &HeaderMap) -> anyhow::Result<Option<[u8; 20]>> {
        let sha1_string = headers.get("x-checksum-sha1")
            .or_else(|| headers.get("x-goog-meta-checksum-sha1"))
            .and_then(|h| h.to_str().ok())
            .map(|s| s.trim_matches('"'));

        match sha1_string {
            Some(s) => Ok(Some(<[u8;20]>::from_hex(s)?)),
            None => Ok(None),
        }
    }

    fn md5_header(headers: &HeaderMap) -> anyhow::Result<Option<[u8; 16]>> {
        let md5_string = headers.get("x-checksum-md5")
            .or_else(|| headers.get("x-goog-meta-checksum-md5"))
            .and_then(|h| h.to_str().ok());

        match md5_string {
            Some(s) => Ok(Some(<[u8;16]>::from_hex(s)?)),
            None => Ok(None),
        }
    }

    fn header_string(headers: &HeaderMap, name: hyper::header::HeaderName) -> Option<String> {
        headers.get(name)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string())
    }

    fn check_status(response: &Response<Body>, location: &str) -> anyhow::Result<bool> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            trace!("{} does not exist ({})", location, status);
            return Ok(false);
        }
        if !status.is_success() {
            return Err(anyhow::anyhow!("request to {} failed: {}", location, status));
        }
        Ok(true)
    }
}
impl Default for HttpResourceRepository {
    fn default() -> Self {
        HttpResourceRepository::new()
    }
}

#[async_trait]
impl ExternalResourceRepository for HttpResourceRepository {
    async fn get_metadata(&self, location: &ExternalResourceName) -> anyhow::Result<Option<ExternalResourceMetaData>> {
        let uri = location.uri();
        let response = self.request(Method::HEAD, &uri, Body::empty()).await?;
        if !Self::check_status(&response, &uri)? {
            return Ok(None);
        }

        let headers = response.headers();
        Ok(Some(ExternalResourceMetaData {
            content_length: Self::header_string(headers, CONTENT_LENGTH).and_then(|s| s.parse().ok()),
            sha1: Self::sha1_header(headers)?,
            etag: Self::header_string(headers, ETAG),
            last_modified: Self::header_string(headers, LAST_MODIFIED),
        }))
    }

    async fn get(&self, location: &ExternalResourceName) -> anyhow::Result<Option<Blob>> {
        let uri = location.uri();
        let response = self.request(Method::GET, &uri, Body::empty()).await?;
        if !Self::check_status(&response, &uri)? {
            return Ok(None);
        }

        let expected_sha1 = Self::sha1_header(response.headers())?;
        let expected_md5 = Self::md5_header(response.headers())?;

        let checksums = expected_sha1.map(ExpectedChecksum::sha1).into_iter()
            .chain(expected_md5.map(ExpectedChecksum::md5))
            .collect();

        Ok(Some(Blob {
            data: Box::pin(ChecksumVerifyingStream::new(response.into_body(), checksums)),
            md5: expected_md5,
            sha1: expected_sha1,
        }))
    }

    async fn list(&self, parent: &ExternalResourceName) -> anyhow::Result<Option<Vec<String>>> {
        let mut uri = parent.uri();
        if !uri.ends_with('/') {
            uri.push('/');
        }

        let response = self.request(Method::GET, &uri, Body::empty()).await?;
        if !Self::check_status(&response, &uri)? {
            return Ok(None);
        }
        let html = to_bytes(response.into_body()).await?;
        Ok(Some(parse_directory_listing(&String::from_utf8_lossy(&html))))
    }

    async fn put(&self, location: &ExternalResourceName, content: Bytes) -> anyhow::Result<()> {
        let uri = location.uri();
        let response = self.request(Method::PUT, &uri, Body::from(content)).await?;
        if !response.status().is_success() {
            return Err(anyhow::anyhow!("upload to {} failed: {}", uri, response.status()));
        }
        Ok(())
    }
}

/// Extracts child names from an HTML directory listing. This is a heuristic: anything that
///  looks like a link to a direct child counts.
fn parse_directory_listing(html: &str) -> Vec<String> {
    let mut result: Vec<String> = vec![];
    for capture in HREF_REGEX.captures_iter(html) {
        let href = &capture[1];
        if href.starts_with('?') || href.starts_with('#') || href.starts_with("..") {
            continue;
        }
        let href = href.split(|c| c == '?' || c == '#').next().unwrap_or("");
        let name = href.trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("");
        if name.is_empty() || name == "." {
            continue;
        }
        if !result.iter().any(|n| n == name) {
            result.push(name.to_string());
        }
    }
    result
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_directory_listing() {
        let html = r#"
            <html><body>
            <a href="../">../</a>
            <a href="1.0/">1.0/</a>
            <a href="1.1/" title="1.1">1.1/</a>
            <A HREF="maven-metadata.xml">maven-metadata.xml</A>
            <a href="?C=M;O=A">Last modified</a>
            <a href="1.0/">1.0/</a>
            </body></html>
        "#;
        assert_eq!(parse_directory_listing(html), vec!["1.0", "1.1", "maven-metadata.xml"]);
    }

    #[test]
    fn test_sha1_header_with_quotes() {
        let mut headers = HeaderMap::new();
        headers.insert("x-checksum-sha1", "\"aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d\"".parse().unwrap());
        assert!(HttpResourceRepository::sha1_header(&headers).unwrap().is_some());
    }

    #[test]
    fn test_invalid_sha1_header_is_an_error() {
        let mut headers = HeaderMap::new();
        headers.insert("x-checksum-sha1", "not-a-hash".parse().unwrap());
        assert!(HttpResourceRepository::sha1_header(&headers).is_err());
    }
}

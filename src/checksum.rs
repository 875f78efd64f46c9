use std::fmt::{Display, Formatter};
use std::path::Path;

use futures::StreamExt;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    Sha1,
    Sha256,
    Sha512,
}
impl ChecksumAlgorithm {
    /// the suffix of the checksum file next to a published artifact
    pub fn extension(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha1 => "sha1",
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Sha512 => "sha512",
        }
    }
}
impl Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ChecksumAlgorithm::Sha1 => "SHA-1",
            ChecksumAlgorithm::Sha256 => "SHA-256",
            ChecksumAlgorithm::Sha512 => "SHA-512",
        })
    }
}

async fn digest_file<D: Digest>(path: &Path) -> anyhow::Result<Vec<u8>> {
    let mut stream = ReaderStream::new(File::open(path).await?);
    let mut hasher = D::new();
    while let Some(chunk) = stream.next().await {
        hasher.update(&chunk?);
    }
    Ok(hasher.finalize().to_vec())
}

/// lowercase hex checksum of a file's content
pub async fn checksum_of_file(path: &Path, algorithm: ChecksumAlgorithm) -> anyhow::Result<String> {
    let digest = match algorithm {
        ChecksumAlgorithm::Sha1 => digest_file::<Sha1>(path).await?,
        ChecksumAlgorithm::Sha256 => digest_file::<Sha256>(path).await?,
        ChecksumAlgorithm::Sha512 => digest_file::<Sha512>(path).await?,
    };
    Ok(hex::encode(digest))
}

#[cfg(test)]
mod test {
    use rstest::*;
    use super::*;

    #[rstest]
    #[case::sha1(ChecksumAlgorithm::Sha1, "a9993e364706816aba3e25717850c26c9cd0d89d")]
    #[case::sha256(ChecksumAlgorithm::Sha256, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")]
    #[case::sha512(ChecksumAlgorithm::Sha512, "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f")]
    #[tokio::test]
    async fn test_checksum_of_file(#[case] algorithm: ChecksumAlgorithm, #[case] expected: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, b"abc").unwrap();

        assert_eq!(checksum_of_file(&path, algorithm).await.unwrap(), expected);
    }
}

//! The `maven-metadata.xml` file format as described at
//!  https://maven.apache.org/ref/3.9.5/maven-repository-metadata/repository-metadata.html

use serde::Deserialize;

#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub versioning: Option<Versioning>,
}

#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Versioning {
    pub latest: Option<String>,
    pub release: Option<String>,
    pub versions: Option<Versions>,
    pub last_updated: Option<String>,
    pub snapshot: Option<Snapshot>,
    pub snapshot_versions: Option<SnapshotVersions>,
}

#[derive(Deserialize, Debug, Default, PartialEq)]
pub struct Versions {
    #[serde(default)]
    pub version: Vec<String>,
}

#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub timestamp: Option<String>,
    pub build_number: Option<String>,
    pub local_copy: Option<String>,
}

#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotVersions {
    #[serde(default)]
    pub snapshot_version: Vec<SnapshotVersion>,
}

#[derive(Deserialize, Debug, Default, PartialEq)]
pub struct SnapshotVersion {
    pub classifier: Option<String>,
    pub extension: Option<String>,
    pub value: Option<String>,
    pub updated: Option<String>,
}

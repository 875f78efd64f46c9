//! Gradle module metadata (`.module` files), format version 1.1

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::model::artifact::{IvyArtifactName, ModuleComponentArtifactMetadata};
use crate::model::coordinates::ModuleComponentIdentifier;
use crate::model::metadata::{DependencyMetadataBuilder, MutableModuleMetadata, VariantMetadata, VersionConstraint};

pub const FORMAT_VERSION: &str = "1.1";
pub const STATUS_ATTRIBUTE: &str = "org.gradle.status";

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ModuleFile {
    format_version: String,
    #[serde(default)]
    component: Component,
    #[serde(default)]
    variants: Vec<Variant>,
}

#[derive(Deserialize, Debug, Default)]
struct Component {
    #[serde(default)]
    attributes: BTreeMap<String, Value>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Variant {
    name: String,
    #[serde(default)]
    attributes: BTreeMap<String, Value>,
    #[serde(default)]
    files: Vec<File>,
    #[serde(default)]
    dependencies: Vec<Dependency>,
    #[serde(default)]
    dependency_constraints: Vec<Dependency>,
    #[serde(rename = "available-at")]
    available_at: Option<AvailableAt>,
}

#[derive(Deserialize, Debug)]
struct File {
    name: String,
    url: String,
}

#[derive(Deserialize, Debug)]
struct AvailableAt {
    url: String,
    group: String,
    module: String,
    version: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Dependency {
    group: String,
    module: String,
    #[serde(default)]
    version: Version,
    reason: Option<String>,
    #[serde(default)]
    endorse_strict_versions: bool,
    third_party_compatibility: Option<ThirdPartyCompatibility>,
}

#[derive(Deserialize, Debug, Default)]
struct Version {
    requires: Option<String>,
    prefers: Option<String>,
    strictly: Option<String>,
    #[serde(default)]
    rejects: Vec<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ThirdPartyCompatibility {
    artifact_selector: Option<ArtifactSelector>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ArtifactSelector {
    name: String,
    #[serde(rename = "type")]
    artifact_type: String,
    extension: Option<String>,
    classifier: Option<String>,
}

fn attribute_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn attributes(raw: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    raw.iter()
        .map(|(k, v)| (k.clone(), attribute_string(v)))
        .collect()
}

impl From<Version> for VersionConstraint {
    fn from(value: Version) -> Self {
        VersionConstraint {
            requires: value.requires,
            prefers: value.prefers,
            strictly: value.strictly,
            rejects: value.rejects,
        }
    }
}

/// an artifact for a file declared by URL, e.g. `foo-1.0-all.jar`
fn file_artifact(id: &ModuleComponentIdentifier, file: &File) -> ModuleComponentArtifactMetadata {
    let (stem, extension) = match file.name.rsplit_once('.') {
        Some((stem, extension)) => (stem, Some(extension)),
        None => (file.name.as_str(), None),
    };
    ModuleComponentArtifactMetadata::url_backed(
        id.clone(),
        IvyArtifactName::new(stem, extension.unwrap_or(""), extension, None),
        &file.url,
    )
}

/// Parses Gradle module metadata into module metadata for the given component
pub fn parse_module_metadata(content: &str, id: &ModuleComponentIdentifier) -> anyhow::Result<MutableModuleMetadata> {
    let raw: ModuleFile = serde_json::from_str(content)?;
    if raw.format_version != FORMAT_VERSION {
        debug!("unrecognized module metadata format version '{}' for {}, parsing anyway", raw.format_version, id);
    }

    let mut metadata = MutableModuleMetadata::new(id.clone());
    metadata.attributes = attributes(&raw.component.attributes);
    if let Some(status) = metadata.attributes.get(STATUS_ATTRIBUTE) {
        metadata.status = status.clone();
    }

    for variant in raw.variants {
        let mut result = VariantMetadata::new(&variant.name);
        result.attributes = attributes(&variant.attributes);

        if let Some(available_at) = variant.available_at {
            if !variant.files.is_empty() || !variant.dependency_constraints.is_empty() {
                return Err(anyhow::anyhow!("variant '{}' is declared with available-at ({}) and cannot declare files or dependency constraints", variant.name, available_at.url));
            }
            result.dependencies.push(
                DependencyMetadataBuilder::dependency(available_at.group, available_at.module)
                    .version(available_at.version)
                    .build()
            );
        }
        else {
            for dependency in variant.dependencies {
                let mut builder = DependencyMetadataBuilder::dependency(dependency.group, dependency.module)
                    .version_constraint(dependency.version.into())
                    .endorse_strict_versions(dependency.endorse_strict_versions);
                if let Some(reason) = dependency.reason {
                    builder = builder.reason(reason);
                }
                if let Some(selector) = dependency.third_party_compatibility.and_then(|t| t.artifact_selector) {
                    builder = builder.artifact(IvyArtifactName::new(
                        selector.name,
                        selector.artifact_type,
                        selector.extension.as_deref(),
                        selector.classifier.as_deref(),
                    ));
                }
                if !result.dependencies.contains(&builder.clone().build()) {
                    result.dependencies.push(builder.build());
                }
            }
            for constraint in variant.dependency_constraints {
                let mut builder = DependencyMetadataBuilder::constraint(constraint.group, constraint.module)
                    .version_constraint(constraint.version.into());
                if let Some(reason) = constraint.reason {
                    builder = builder.reason(reason);
                }
                result.dependencies.push(builder.build());
            }
            for file in &variant.files {
                result.artifacts.push(file_artifact(id, file));
            }
        }

        metadata.variants.push(result);
    }
    Ok(metadata)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::artifact::ArtifactKind;

    const MODULE: &str = r#"{
  "formatVersion": "1.1",
  "component": {
    "group": "org.example",
    "module": "foo",
    "version": "1.0",
    "attributes": { "org.gradle.status": "release" }
  },
  "createdBy": { "gradle": { "version": "8.5" } },
  "variants": [
    {
      "name": "apiElements",
      "attributes": { "org.gradle.category": "library", "org.gradle.jvm.version": 11 },
      "dependencies": [
        { "group": "org.lib", "module": "lib", "version": { "requires": "2.0", "rejects": ["1.9"] }, "reason": "api" },
        { "group": "org.lib", "module": "lib", "version": { "requires": "2.0", "rejects": ["1.9"] }, "reason": "api" }
      ],
      "dependencyConstraints": [
        { "group": "org.lib", "module": "other", "version": { "strictly": "3.0" } }
      ],
      "files": [
        { "name": "foo-1.0.jar", "url": "foo-1.0.jar", "size": 123, "sha1": "abc" }
      ]
    },
    {
      "name": "jvmRuntime",
      "available-at": { "url": "../../foo-jvm/1.0/foo-jvm-1.0.module", "group": "org.example", "module": "foo-jvm", "version": "1.0" }
    }
  ]
}"#;

    #[test]
    fn test_parse() {
        let metadata = parse_module_metadata(MODULE, &ModuleComponentIdentifier::new("org.example", "foo", "1.0")).unwrap();
        assert_eq!(metadata.status, "release");
        assert_eq!(metadata.variants.len(), 2);

        let api = &metadata.variants[0];
        assert_eq!(api.attributes.get("org.gradle.jvm.version").map(|s| s.as_str()), Some("11"));
        assert_eq!(api.dependencies.len(), 2);
        assert_eq!(api.dependencies[0].selector.version_constraint.rejects, vec!["1.9"]);
        assert!(api.dependencies[1].is_constraint());
        assert_eq!(api.dependencies[1].selector.version_constraint.strictly.as_deref(), Some("3.0"));

        assert_eq!(api.artifacts.len(), 1);
        assert_eq!(api.artifacts[0].kind, ArtifactKind::UrlBacked { relative_url: "foo-1.0.jar".to_string() });

        let runtime = &metadata.variants[1];
        assert_eq!(runtime.dependencies[0].selector.module.name, "foo-jvm");
        assert!(runtime.artifacts.is_empty());
    }

    #[test]
    fn test_invalid_json() {
        assert!(parse_module_metadata("{ \"formatVersion\": ", &ModuleComponentIdentifier::new("g", "m", "1")).is_err());
    }
}

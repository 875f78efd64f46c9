use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::model::coordinates::ModuleComponentIdentifier;
use crate::model::metadata::{DependencyKind, DependencyMetadata, DependencyMetadataBuilder, MutableModuleMetadata, VariantMetadata};

/// What a component metadata supplier knows about a component
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComponentMetadataDetails {
    pub status: Option<String>,
    pub status_scheme: Option<Vec<String>>,
    pub attributes: BTreeMap<String, String>,
    dependencies: Vec<DependencyMetadata>,
}
impl ComponentMetadataDetails {
    /// `group:name` or `group:name:version`
    pub fn add_dependency(&mut self, notation: &str) -> anyhow::Result<()> {
        self.dependencies.push(DependencyMetadataBuilder::from_notation(DependencyKind::Dependency, notation)?.build());
        Ok(())
    }

    pub fn add_constraint(&mut self, notation: &str) -> anyhow::Result<()> {
        self.dependencies.push(DependencyMetadataBuilder::from_notation(DependencyKind::Constraint, notation)?.build());
        Ok(())
    }

    pub fn dependencies(&self) -> &[DependencyMetadata] {
        &self.dependencies
    }

    pub(crate) fn into_module_metadata(self, id: ModuleComponentIdentifier) -> MutableModuleMetadata {
        let mut metadata = MutableModuleMetadata::new(id);
        if let Some(status) = self.status {
            metadata.status = status;
        }
        if let Some(status_scheme) = self.status_scheme {
            metadata.status_scheme = status_scheme;
        }
        metadata.attributes = self.attributes;

        let mut variant = VariantMetadata::new("default");
        variant.dependencies = self.dependencies;
        metadata.variants.push(variant);
        metadata
    }
}

/// User supplied component metadata, the last resort when a repository has no descriptor
///  for a component
#[async_trait]
pub trait ComponentMetadataSupplier: Send + Sync {
    /// `None` if the supplier does not know the component
    async fn supply(&self, id: &ModuleComponentIdentifier) -> anyhow::Result<Option<ComponentMetadataDetails>>;
}

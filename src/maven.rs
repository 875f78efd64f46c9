pub mod metadata_loader;
pub mod metadata_xml;
pub mod pom;

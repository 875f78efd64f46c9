pub mod artifact_resolver;
pub mod blob;
pub mod checksum;
pub mod config;
pub mod error;
pub mod ivy;
pub mod maven;
pub mod metadata;
pub mod model;
pub mod pattern;
pub mod publish;
pub mod resolver;
pub mod resource;
pub mod util;
pub mod version_lister;

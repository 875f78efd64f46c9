pub mod artifact;
pub mod coordinates;
pub mod metadata;
pub mod results;

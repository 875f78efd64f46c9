pub mod gradle_module;
pub mod source;
pub mod supplier;

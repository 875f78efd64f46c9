pub mod blob_storage;
pub mod fs_blob_storage;

pub mod blob;
pub mod checksum_stream;

/// Local filesystem partition layout.
pub mod fs;

pub use fs::PartitionFiles;

pub mod audit;
pub mod in_memory;
pub mod numbering;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;

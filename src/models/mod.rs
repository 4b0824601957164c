pub mod files;
pub mod job;
pub mod scan;
pub mod terraform;

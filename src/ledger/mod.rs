pub mod tables;
pub mod types;
pub mod watermark;
pub mod writer;

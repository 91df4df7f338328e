pub mod config;
pub mod logging;

pub mod assembler;
pub mod checksum;
pub mod downloader;
pub mod protocol;
pub mod segmenter;
pub mod server;
pub mod throttle;
pub mod transfer;

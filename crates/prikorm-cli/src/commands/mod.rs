pub mod common;
pub mod config;
pub mod dates;
pub mod export;
pub mod family;
pub mod log;
pub mod plan;
pub mod sync;

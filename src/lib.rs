pub mod acquisition;
pub mod analysis;
pub mod config;
pub mod error;
pub mod logger;
pub mod recording;
pub mod signal;
pub mod types;
pub mod utils;

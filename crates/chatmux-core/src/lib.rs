pub mod backoff;
pub mod cache;
pub mod config;
pub mod layout;
pub mod paths;

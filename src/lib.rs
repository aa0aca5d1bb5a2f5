pub mod bundle;
pub mod cache;
pub mod config;
pub mod dict;
pub mod hashing;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod segment;
pub mod textutil;

pub mod config;
pub mod datagen;
pub mod errors;
pub mod loader;
pub mod models;
pub mod registry;
pub mod service;

pub use config::AppConfig;
pub use service::{MatchEngine, RunSummary};

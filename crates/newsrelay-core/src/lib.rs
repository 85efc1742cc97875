pub mod config;
pub mod delivery;
pub mod error;
pub mod feed;
pub mod pipeline;
pub mod scheduler;
pub mod service;
pub mod storage;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use service::NewsRelay;

pub mod config;
pub mod error;
pub mod types;

pub use config::NexoConfig;
pub use error::{NexoError, Result};
pub use types::*;

pub mod camera;
pub mod common;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod pipeline;

pub use config::Configuration;
pub use coordinator::{Coordinator, CoordinatorBuilder, EngineHandle, EngineSnapshot};
pub use error::{AppError, CaptureError, ConfigError};

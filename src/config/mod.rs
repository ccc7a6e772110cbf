/// Application configuration
pub mod app;
pub use app::{load_app_config, AppConfig, DEFAULT_CONFIG_FILE, DEFAULT_LOG_DIR};

/// Configuration traits
pub mod traits;
pub use traits::Configuration;

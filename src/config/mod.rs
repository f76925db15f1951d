// Configuration: schema + loader

pub mod loader;
pub mod settings;

pub use loader::{default_config_path, load_settings};
pub use settings::Settings;

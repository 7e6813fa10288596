mod dirs;
mod settings;
mod validation;

pub use dirs::Directories;
pub use settings::{Config, ConnectionConfig, SyncConfig};
pub use validation::warn_unknown_fields;

//! Configuration loading
//!
//! Reads [`ClientSettings`](tixlens_domain::ClientSettings) from TOML or
//! JSON files and `TIXLENS_*` environment variables.

pub mod loader;

// Re-export commonly used items
pub use loader::{
    apply_env_overrides, load, load_from_env, load_from_file, probe_config_paths, CONFIG_PATH_VAR,
};

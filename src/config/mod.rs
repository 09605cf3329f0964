// src/config/mod.rs

//! Declarative configuration: TOML model, loading and validation.

pub mod loader;
pub mod model;
pub mod validate;

pub use model::{ConfigFile, GroupConfig, ReloadSetting, ServeConfig, Settings, TaskConfig, WatchConfig};

//! Shared configuration for the sdkgen passes.
//!
//! The models, services and builder generators may run as separate
//! invocations. They agree on naming and package ownership only because they
//! all load the same [`GeneratorConfig`], so it lives in its own crate that
//! both the core library and the CLI depend on.

pub mod config;

pub use config::{
    BuilderConfig, ConfigError, DEFAULT_CONFIG, GeneratorConfig, NamingConfig, TypesConfig,
};

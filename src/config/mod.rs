//! Configuration module for driftscope.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `driftscope.yaml`
//! - Validation of projects, environments and components
//! - Grouping environments for display

mod environments;
mod parser;
mod spec;
mod validator;

pub use environments::{group_environments, EnvironmentGroups, DEFAULT_GROUP, DEFAULT_REGION};
pub use parser::{find_config_file, ConfigParser, API_TOKEN_VAR, DEFAULT_CONFIG_FILES};
pub use spec::{
    ComponentConfig, DriftConfig, EnvironmentConfig, ProjectConfig, StoreBackend, StoreConfig,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};

//! Error types for the driftscope system.
//!
//! Classification and aggregation never fail; errors only come from the
//! outer layers: configuration, plan ingestion, the local plan archive and
//! the remote drift API.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for driftscope.
#[derive(Debug, Error)]
pub enum DriftError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Plan ingestion errors.
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// Plan archive errors.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Remote drift API errors.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors outside of the archive (plan files, CLI output).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// Duplicate definition.
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName {
        /// Kind of definition (component, environment).
        kind: String,
        /// The duplicated name.
        name: String,
    },

    /// A component depends on a component that is not declared.
    #[error("Component '{component}' depends on unknown component '{dependency}'")]
    UnknownDependency {
        /// The declaring component.
        component: String,
        /// The missing dependency.
        dependency: String,
    },

    /// Circular dependency detected.
    #[error("Circular dependency detected: {cycle}")]
    CircularDependency {
        /// Description of the cycle.
        cycle: String,
    },
}

/// Plan ingestion errors.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A required field is missing from the request or plan.
    #[error("Missing required field: {field}")]
    MissingField {
        /// Name of the missing field.
        field: String,
    },

    /// The document is not a usable Terraform JSON plan.
    #[error("Invalid Terraform plan: {message}")]
    InvalidPlan {
        /// Description of the problem.
        message: String,
    },

    /// The plan targets a different cloud than the project.
    #[error("Platform mismatch: project is '{project}' but uploaded plan is '{plan}'")]
    PlatformMismatch {
        /// Platform recorded for the project.
        project: String,
        /// Platform detected in the plan.
        plan: String,
    },

    /// The plan is not newer than the latest stored plan.
    #[error(
        "Stale plan: uploaded plan timestamp ({uploaded}) is not newer than latest plan ({latest})"
    )]
    StalePlan {
        /// Timestamp of the uploaded plan.
        uploaded: String,
        /// Timestamp of the latest stored plan.
        latest: String,
    },

    /// The component is not declared in the project.
    #[error("Component '{name}' not found in project '{project}'")]
    UnknownComponent {
        /// Requested component.
        name: String,
        /// Project name.
        project: String,
    },

    /// The environment is not declared in the project.
    #[error("Environment '{name}' not found in project '{project}'")]
    UnknownEnvironment {
        /// Requested environment.
        name: String,
        /// Project name.
        project: String,
    },
}

/// Plan archive errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Plan not found.
    #[error("Plan not found: {id}")]
    NotFound {
        /// Missing plan id.
        id: String,
    },

    /// A stored plan could not be read back.
    #[error("Plan archive is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Serialization error.
    #[error("Plan serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// Filesystem failure inside the archive.
    #[error("Plan archive IO error: {message}")]
    Io {
        /// Description of the failure.
        message: String,
    },
}

/// Remote drift API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication failed.
    #[error("API authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("API request failed: {status} - {message}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from API.
        message: String,
    },

    /// Rate limited.
    #[error("API rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Resource not found.
    #[error("Not found: {resource}")]
    NotFound {
        /// Description of the missing resource.
        resource: String,
    },

    /// Network error.
    #[error("Network error communicating with the drift API: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from the drift API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Result type alias for driftscope operations.
pub type Result<T> = std::result::Result<T, DriftError>;

impl DriftError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Api(ApiError::RateLimited { .. } | ApiError::NetworkError { .. })
        )
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Api(ApiError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            Self::Api(ApiError::NetworkError { .. }) => Some(1),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl IngestError {
    /// Creates an invalid plan error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidPlan {
            message: message.into(),
        }
    }
}

impl StoreError {
    /// Creates an IO error with the given message.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl ApiError {
    /// Creates a request failure error.
    #[must_use]
    pub fn request_failed(status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }
}

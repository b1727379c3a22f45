use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeltacloudError {
    #[error("Authentication Failure")]
    AuthenticationFailure,

    #[error("{kind} '{id}' not found")]
    NotFound { kind: String, id: String },

    #[error("Operation '{operation}' is not supported by the current driver")]
    NotSupported { operation: String },

    #[error("Action '{action}' is not allowed in state {state}")]
    InvalidState { action: String, state: String },

    #[error("Backend error ({status}): {message}")]
    BackendError { status: u16, message: String },

    #[error("Provider request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("The database needs to be upgraded. Run: 'deltacloud-db-upgrade' command.")]
    DatabaseOutdated { pending: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Client,
    Provider,
    Storage,
    Configuration,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DeltacloudError {
    pub fn not_found(kind: &str, id: &str) -> Self {
        DeltacloudError::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    pub fn not_supported(operation: &str) -> Self {
        DeltacloudError::NotSupported {
            operation: operation.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DeltacloudError::ValidationError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DeltacloudError::AuthenticationFailure
            | DeltacloudError::NotFound { .. }
            | DeltacloudError::NotSupported { .. }
            | DeltacloudError::InvalidState { .. }
            | DeltacloudError::ValidationError { .. } => ErrorCategory::Client,
            DeltacloudError::BackendError { .. } | DeltacloudError::ApiError(_) => {
                ErrorCategory::Provider
            }
            DeltacloudError::DatabaseError(_)
            | DeltacloudError::MigrationError(_)
            | DeltacloudError::DatabaseOutdated { .. } => ErrorCategory::Storage,
            DeltacloudError::MissingConfigError { .. }
            | DeltacloudError::InvalidConfigValueError { .. }
            | DeltacloudError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            DeltacloudError::IoError(_) | DeltacloudError::SerializationError(_) => {
                ErrorCategory::Internal
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Client => ErrorSeverity::Low,
            ErrorCategory::Provider => ErrorSeverity::Medium,
            ErrorCategory::Internal => ErrorSeverity::High,
            ErrorCategory::Storage | ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    /// HTTP 狀態碼對應
    pub fn status_code(&self) -> u16 {
        match self {
            DeltacloudError::AuthenticationFailure => 401,
            DeltacloudError::NotFound { .. } => 404,
            DeltacloudError::NotSupported { .. } => 405,
            DeltacloudError::InvalidState { .. } => 409,
            DeltacloudError::ValidationError { .. } => 400,
            DeltacloudError::BackendError { .. } | DeltacloudError::ApiError(_) => 502,
            _ => 500,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            DeltacloudError::AuthenticationFailure => {
                "Check the provider credentials sent with the request".to_string()
            }
            DeltacloudError::NotFound { .. } => {
                "List the collection to find a valid identifier".to_string()
            }
            DeltacloudError::NotSupported { .. } => {
                "Inspect the API entry point for the operations this driver supports".to_string()
            }
            DeltacloudError::InvalidState { .. } => {
                "Use one of the actions listed on the instance".to_string()
            }
            DeltacloudError::BackendError { .. } | DeltacloudError::ApiError(_) => {
                "Verify that the provider endpoint is reachable and healthy".to_string()
            }
            DeltacloudError::MigrationError(_) | DeltacloudError::DatabaseOutdated { .. } => {
                "Run the 'deltacloud-db-upgrade' command".to_string()
            }
            DeltacloudError::DatabaseError(_) => {
                "Check DATABASE_LOCATION and file permissions of the storage directory".to_string()
            }
            DeltacloudError::MissingConfigError { field }
            | DeltacloudError::InvalidConfigValueError { field, .. }
            | DeltacloudError::ConfigValidationError { field, .. } => {
                format!("Fix the '{}' setting in the config file or command line", field)
            }
            DeltacloudError::ValidationError { .. } => {
                "Correct the request parameters and retry".to_string()
            }
            DeltacloudError::IoError(_) | DeltacloudError::SerializationError(_) => {
                "Re-run with --verbose and inspect the logs".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Storage => format!("Local storage problem: {}", self),
            ErrorCategory::Provider => format!("The cloud provider failed: {}", self),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DeltacloudError>;

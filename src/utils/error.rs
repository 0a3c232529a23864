use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV parse error: {message}")]
    ParseError { message: String },

    #[error("Column mapping conflict: {target} is mapped from {}", .headers.join(", "))]
    MappingConflict { target: String, headers: Vec<String> },

    #[error("API returned HTTP {status} for {path}: {body}")]
    HttpStatus {
        status: u16,
        path: String,
        body: String,
    },

    #[error("API rejected the request to {path}: {message}")]
    ApiRejected { path: String, message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Cannot {action} while session is {state}")]
    InvalidState { state: String, action: String },

    #[error("Import blocked: {error_count} validation error(s) must be fixed first")]
    ImportBlocked { error_count: usize },
}

pub type Result<T> = std::result::Result<T, ImportError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Configuration,
    Workflow,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ImportError {
    pub fn parse(message: impl Into<String>) -> Self {
        ImportError::ParseError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ImportError::ApiError(_)
            | ImportError::HttpStatus { .. }
            | ImportError::ApiRejected { .. } => ErrorCategory::Network,
            ImportError::SerializationError(_)
            | ImportError::ParseError { .. }
            | ImportError::MappingConflict { .. } => ErrorCategory::Data,
            ImportError::ConfigError { .. }
            | ImportError::ConfigValidationError { .. }
            | ImportError::InvalidConfigValueError { .. }
            | ImportError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ImportError::InvalidState { .. } | ImportError::ImportBlocked { .. } => {
                ErrorCategory::Workflow
            }
            ImportError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ImportError::InvalidState { .. } => ErrorSeverity::Low,
            ImportError::ApiError(_)
            | ImportError::HttpStatus { .. }
            | ImportError::ApiRejected { .. }
            | ImportError::ImportBlocked { .. } => ErrorSeverity::Medium,
            ImportError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// 給終端使用者看的簡短訊息
    pub fn user_friendly_message(&self) -> String {
        match self {
            ImportError::ApiError(_) => "Could not reach the inventory API".to_string(),
            ImportError::HttpStatus { status, path, .. } => {
                format!("Inventory API rejected the request to {} (HTTP {})", path, status)
            }
            ImportError::ParseError { .. } => {
                format!("The CSV file could not be read: {}", self)
            }
            ImportError::MappingConflict { target, headers } => format!(
                "Columns {} are all mapped to '{}'",
                headers.join(", "),
                target
            ),
            ImportError::IoError(e) => format!("File access failed: {}", e),
            ImportError::ImportBlocked { error_count } => format!(
                "Nothing was imported: {} validation error(s) found",
                error_count
            ),
            _ => self.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self.category() {
            ErrorCategory::Network => {
                "Check the API URL, token and network connectivity, then retry".to_string()
            }
            ErrorCategory::Data => match self {
                ImportError::MappingConflict { .. } => {
                    "Map each target field from a single column (see --map)".to_string()
                }
                _ => "Check the delimiter, quote character and header row of the CSV file"
                    .to_string(),
            },
            ErrorCategory::Configuration => {
                "Fix the configuration file or command line arguments".to_string()
            }
            ErrorCategory::Workflow => {
                "Fix the reported validation errors and run the import again".to_string()
            }
            ErrorCategory::System => "Check file paths and permissions".to_string(),
        }
    }
}

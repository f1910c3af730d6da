use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Request failed with status: {status}, message: {body}")]
    FetchFailed { status: u16, body: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Malformed API payload: {message}")]
    MalformedPayload { message: String },

    #[error("Empty dataset: cannot derive header from empty record set")]
    EmptyDataset,

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Blob storage error: {0}")]
    StorageError(#[from] object_store::Error),

    #[error("Email error: {message}")]
    EmailError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Storage,
    Notification,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Process exit code for a run that ended with an error of this severity.
    /// Never 0.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_) | EtlError::FetchFailed { .. } => ErrorCategory::Network,
            EtlError::SerializationError(_)
            | EtlError::MalformedPayload { .. }
            | EtlError::EmptyDataset
            | EtlError::CsvError(_) => ErrorCategory::Data,
            EtlError::IoError(_) | EtlError::StorageError(_) => ErrorCategory::Storage,
            EtlError::EmailError { .. } => ErrorCategory::Notification,
            EtlError::MissingConfigError { .. } | EtlError::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Notification => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::ApiError(_) => "Check network connectivity to the Quick Stats API",
            EtlError::FetchFailed { status: 401 | 403, .. } => "Check that API_KEY is valid",
            EtlError::FetchFailed { .. } => {
                "The Quick Stats API rejected the request; retry later or narrow the query"
            }
            EtlError::SerializationError(_) | EtlError::MalformedPayload { .. } => {
                "The API response format may have changed; inspect the raw payload"
            }
            EtlError::EmptyDataset => "The query matched no records; check COMMODITY and YEAR_GE",
            EtlError::CsvError(_) => "Inspect the fetched records for unexpected values",
            EtlError::IoError(_) => "Check that the output directory is writable",
            EtlError::StorageError(_) => {
                "Check AZURE_CONNECTION_STRING and that the container exists"
            }
            EtlError::EmailError { .. } => "Check GMAIL_USER, GMAIL_APP_PASSWORD and RECIPIENT",
            EtlError::MissingConfigError { .. } | EtlError::InvalidConfigValueError { .. } => {
                "Set the required environment variables before running"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::FetchFailed { status, .. } => {
                format!("Quick Stats API returned HTTP {}", status)
            }
            EtlError::EmptyDataset => "No records were returned by the API".to_string(),
            EtlError::MissingConfigError { field } => {
                format!("Environment variable {} is not set", field)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

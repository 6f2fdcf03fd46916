use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Listing rejected: {reason}")]
    Rejected { reason: String },

    #[error("Scrape failed for {url}: {message}")]
    ScrapeError { url: String, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Model error: {message}")]
    ModelError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Configuration,
    Storage,
    Model,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        EtlError::Rejected {
            reason: reason.into(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        EtlError::ProcessingError {
            message: message.into(),
        }
    }

    pub fn model(message: impl Into<String>) -> Self {
        EtlError::ModelError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::HttpError(_) | EtlError::ScrapeError { .. } => ErrorCategory::Network,
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::Rejected { .. }
            | EtlError::ProcessingError { .. }
            | EtlError::ValidationError { .. } => ErrorCategory::Data,
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::IoError(_) | EtlError::ZipError(_) => ErrorCategory::Storage,
            EtlError::ModelError { .. } => ErrorCategory::Model,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EtlError::Rejected { .. } => ErrorSeverity::Low,
            EtlError::HttpError(_) | EtlError::ScrapeError { .. } => ErrorSeverity::Medium,
            EtlError::IoError(_) | EtlError::ZipError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.severity() == ErrorSeverity::Medium
    }

    pub fn recovery_suggestion(&self) -> String {
        match self.category() {
            ErrorCategory::Network => {
                "Check the network connection and that the site is reachable, then retry".to_string()
            }
            ErrorCategory::Data => match self {
                EtlError::Rejected { .. } => "The ad does not meet the selection rules; it is skipped".to_string(),
                _ => "Inspect the input files (header names, separators, encoding)".to_string(),
            },
            ErrorCategory::Configuration => {
                "Fix the configuration file or command line flags; run `immo-etl check-config`".to_string()
            }
            ErrorCategory::Storage => {
                "Check that the input files exist and the output directories are writable".to_string()
            }
            ErrorCategory::Model => {
                "Retrain the model (`immo-etl train`) or increase ridge_lambda".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::HttpError(e) => format!("Could not download a page: {}", e),
            EtlError::IoError(e) => format!("File access failed: {}", e),
            EtlError::MissingConfigError { field } => {
                format!("The configuration is missing '{}'", field)
            }
            EtlError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting '{}': {}", field, reason)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_drives_exit_codes() {
        assert_eq!(EtlError::rejected("cheap").severity(), ErrorSeverity::Low);
        assert_eq!(
            EtlError::ScrapeError {
                url: "https://example.com".to_string(),
                message: "timeout".to_string()
            }
            .severity(),
            ErrorSeverity::Medium
        );
        assert_eq!(EtlError::model("singular").severity(), ErrorSeverity::High);
        let io = EtlError::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, "x"));
        assert_eq!(io.severity(), ErrorSeverity::Critical);
        assert_eq!(io.category(), ErrorCategory::Storage);
    }

    #[test]
    fn test_user_friendly_message() {
        let err = EtlError::MissingConfigError {
            field: "dataset.cities".to_string(),
        };
        assert!(err.user_friendly_message().contains("dataset.cities"));
        assert!(!err.recovery_suggestion().is_empty());
    }
}

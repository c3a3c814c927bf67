// --- File: crates/attendu_common/src/error.rs ---
use std::fmt;
use thiserror::Error;

/// The base error type for all AttendU errors.
///
/// This enum provides a common set of error variants that can be used across
/// all crates. Each crate can extend this by implementing
/// From<SpecificError> for AttenduError.
#[derive(Error, Debug)]
pub enum AttenduError {
    /// Error occurred during an HTTP request
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Error occurred while parsing data
    #[error("Failed to parse data: {0}")]
    ParseError(String),

    /// Error occurred due to missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error occurred during authentication or authorization
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Error occurred during validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error occurred during a document-store operation
    #[error("Store error: {0}")]
    StoreError(String),

    /// Error occurred during external service call
    #[error("External service error: {service_name} - {message}")]
    ExternalServiceError {
        service_name: String,
        message: String,
    },

    /// Error occurred due to a resource not being found
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Error occurred due to an internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// A trait for converting errors to HTTP status codes.
///
/// This trait can be implemented by error types to provide a consistent way
/// to convert errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for AttenduError {
    fn status_code(&self) -> u16 {
        match self {
            AttenduError::HttpError(_) => 500,
            AttenduError::ParseError(_) => 400,
            AttenduError::ConfigError(_) => 500,
            AttenduError::AuthError(_) => 401,
            AttenduError::ValidationError(_) => 400,
            AttenduError::StoreError(_) => 500,
            AttenduError::ExternalServiceError { .. } => 502,
            AttenduError::NotFoundError(_) => 404,
            AttenduError::InternalError(_) => 500,
        }
    }
}

// Common error conversions
impl From<reqwest::Error> for AttenduError {
    fn from(err: reqwest::Error) -> Self {
        AttenduError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for AttenduError {
    fn from(err: serde_json::Error) -> Self {
        AttenduError::ParseError(err.to_string())
    }
}

impl From<std::io::Error> for AttenduError {
    fn from(err: std::io::Error) -> Self {
        AttenduError::InternalError(err.to_string())
    }
}

// Utility functions for error handling
pub fn config_error<T: fmt::Display>(message: T) -> AttenduError {
    AttenduError::ConfigError(message.to_string())
}

pub fn validation_error<T: fmt::Display>(message: T) -> AttenduError {
    AttenduError::ValidationError(message.to_string())
}

pub fn not_found<T: fmt::Display>(message: T) -> AttenduError {
    AttenduError::NotFoundError(message.to_string())
}

pub fn external_service_error<T: fmt::Display>(service_name: &str, message: T) -> AttenduError {
    AttenduError::ExternalServiceError {
        service_name: service_name.to_string(),
        message: message.to_string(),
    }
}

pub fn internal_error<T: fmt::Display>(message: T) -> AttenduError {
    AttenduError::InternalError(message.to_string())
}

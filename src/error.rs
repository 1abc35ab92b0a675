//! # Dispatch Error Types
//!
//! Structured error handling for the dispatch pipeline using thiserror.
//! Every failure mode an envelope can hit between pull and acknowledgment
//! has a distinct variant, so the coordinator's abandon decision is an
//! ordinary branch rather than an exception handler.

use thiserror::Error;

/// Failure taxonomy for the dispatch pipeline
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Message source unavailable: {operation}: {message}")]
    SourceUnavailable { operation: String, message: String },

    #[error("Transport decoding failed: {message}")]
    DecodeError { message: String },

    #[error("Payload is not a well-formed document: {message}")]
    ParseError { message: String },

    #[error("Routing key field '{field}' is missing or empty")]
    MissingRoutingKey { field: String },

    #[error("No catalog entry for routing key: {routing_key}")]
    UnknownRoutingKey { routing_key: String },

    #[error("Job submission failed: {message}")]
    SubmissionFailure { message: String },

    #[error("Configuration error: {component}: {message}")]
    Configuration { component: String, message: String },
}

impl DispatchError {
    /// Create a source unavailable error
    pub fn source_unavailable(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a transport decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::DecodeError {
            message: message.into(),
        }
    }

    /// Create a document parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
        }
    }

    /// Create a missing routing key error
    pub fn missing_routing_key(field: impl Into<String>) -> Self {
        Self::MissingRoutingKey {
            field: field.into(),
        }
    }

    /// Create an unknown routing key error
    pub fn unknown_routing_key(routing_key: impl Into<String>) -> Self {
        Self::UnknownRoutingKey {
            routing_key: routing_key.into(),
        }
    }

    /// Create a submission failure error
    pub fn submission_failure(message: impl Into<String>) -> Self {
        Self::SubmissionFailure {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Whether this failure can never succeed on redelivery.
    ///
    /// A malformed payload or a routing key outside the catalog stays broken
    /// no matter how many times the queue re-presents the envelope. Source
    /// and submission failures may clear up on their own.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::DecodeError { .. }
                | Self::ParseError { .. }
                | Self::MissingRoutingKey { .. }
                | Self::UnknownRoutingKey { .. }
        )
    }
}

/// Conversion from sqlx::Error for the query backend path
impl From<sqlx::Error> for DispatchError {
    fn from(err: sqlx::Error) -> Self {
        DispatchError::submission_failure(err.to_string())
    }
}

/// Result type alias for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;

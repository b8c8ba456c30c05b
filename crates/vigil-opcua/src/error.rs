// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the value-observation layer.
//!
//! Errors are grouped by the phase of observation they belong to, which also
//! decides how far they travel:
//!
//! - **Connection** errors end the calling scenario and are returned to the caller.
//! - **Read** errors halt the poll task that produced them.
//! - **Registration** errors are reported per monitored item; a failed item
//!   never aborts the rest of the batch.
//! - **Teardown** errors are logged and swallowed.
//!
//! # Error Categories
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Endpoint discovery and session establishment
//! ├── Read          - Value reads (poll ticks and one-shot reads)
//! ├── Registration  - Subscription and monitored-item creation
//! ├── Teardown      - Subscription deletion and disconnect
//! └── Configuration - Invalid settings and node identifiers
//! ```
//!
//! # Examples
//!
//! ```
//! use vigil_opcua::error::{OpcUaError, ConnectionError, ErrorSeverity};
//!
//! let error = OpcUaError::connection(ConnectionError::refused(
//!     "opc.tcp://localhost:4840"
//! ));
//!
//! assert!(error.is_retryable());
//! assert_eq!(error.severity(), ErrorSeverity::Error);
//! assert_eq!(error.error_code().to_string(), "UA-0101");
//! ```

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

// =============================================================================
// OpcUaError - Main Error Type
// =============================================================================

/// The main error type for observation operations.
#[derive(Debug, Error)]
pub enum OpcUaError {
    /// Connection-related errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Value read errors.
    #[error("{0}")]
    Read(#[from] ReadError),

    /// Subscription and monitored-item registration errors.
    #[error("{0}")]
    Registration(#[from] RegistrationError),

    /// Subscription deletion and disconnect errors.
    #[error("{0}")]
    Teardown(#[from] TeardownError),

    /// Configuration errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
}

impl OpcUaError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a connection error.
    #[inline]
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Creates a read error.
    #[inline]
    pub fn read(error: ReadError) -> Self {
        Self::Read(error)
    }

    /// Creates a registration error.
    #[inline]
    pub fn registration(error: RegistrationError) -> Self {
        Self::Registration(error)
    }

    /// Creates a teardown error.
    #[inline]
    pub fn teardown(error: TeardownError) -> Self {
        Self::Teardown(error)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    // =========================================================================
    // Convenience Factory Methods
    // =========================================================================

    /// Creates a not connected error.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates a read failed error.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Read(ReadError::failed(node_id, message))
    }

    /// Creates a read timeout error.
    pub fn read_timeout(node_id: impl Into<String>, duration: Duration) -> Self {
        Self::Read(ReadError::timeout(node_id, duration))
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if this error is retryable.
    ///
    /// Nothing in this crate retries on its own; the flag is for callers that
    /// wrap the observation layer in their own retry policy.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Read(e) => e.is_retryable(),
            Self::Registration(e) => e.is_retryable(),
            Self::Teardown(_) | Self::Configuration(_) => false,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(e) => e.severity(),
            Self::Read(e) => e.severity(),
            Self::Registration(e) => e.severity(),
            Self::Teardown(_) => ErrorSeverity::Warning,
            Self::Configuration(_) => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Read(_) => "read",
            Self::Registration(_) => "registration",
            Self::Teardown(_) => "teardown",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection(e) => e.error_code(),
            Self::Read(e) => e.error_code(),
            Self::Registration(e) => e.error_code(),
            Self::Teardown(e) => e.error_code(),
            Self::Configuration(e) => e.error_code(),
        }
    }

    /// Returns `true` if the error should end the calling scenario.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Configuration(_))
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let level = self.tracing_level();
        let code = self.error_code();

        match level {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Endpoint discovery and session establishment errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Connection refused.
    #[error("Connection refused to '{endpoint}'")]
    Refused {
        /// Target endpoint.
        endpoint: String,
    },

    /// Connection timed out.
    #[error("Connection timed out to '{endpoint}' after {duration:?}")]
    TimedOut {
        /// Target endpoint.
        endpoint: String,
        /// Timeout duration.
        duration: Duration,
    },

    /// The discovery call returned no endpoints.
    #[error("Endpoint not found: '{endpoint}'")]
    EndpointNotFound {
        /// The endpoint URL.
        endpoint: String,
    },

    /// Invalid endpoint URL.
    #[error("Invalid endpoint URL: '{url}' - {reason}")]
    InvalidEndpoint {
        /// The invalid URL.
        url: String,
        /// Reason.
        reason: String,
    },

    /// No discovered endpoint matches the requested security mode.
    #[error("No suitable endpoint found with security mode '{security_mode}'")]
    NoSuitableEndpoint {
        /// Required security mode.
        security_mode: String,
    },

    /// Session could not be created or activated.
    #[error("Session establishment failed: {message}")]
    SessionFailed {
        /// Error message.
        message: String,
    },

    /// Not connected.
    #[error("Not connected to OPC UA server")]
    NotConnected,
}

impl ConnectionError {
    /// Creates a connection refused error.
    pub fn refused(endpoint: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
        }
    }

    /// Creates a connection timed out error.
    pub fn timed_out(endpoint: impl Into<String>, duration: Duration) -> Self {
        Self::TimedOut {
            endpoint: endpoint.into(),
            duration,
        }
    }

    /// Creates an endpoint not found error.
    pub fn endpoint_not_found(endpoint: impl Into<String>) -> Self {
        Self::EndpointNotFound {
            endpoint: endpoint.into(),
        }
    }

    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a no suitable endpoint error.
    pub fn no_suitable_endpoint(security_mode: impl Into<String>) -> Self {
        Self::NoSuitableEndpoint {
            security_mode: security_mode.into(),
        }
    }

    /// Creates a session establishment error.
    pub fn session_failed(message: impl Into<String>) -> Self {
        Self::SessionFailed {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Refused { .. }
            | Self::TimedOut { .. }
            | Self::SessionFailed { .. }
            | Self::NotConnected => true,
            Self::EndpointNotFound { .. }
            | Self::InvalidEndpoint { .. }
            | Self::NoSuitableEndpoint { .. } => false,
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotConnected | Self::TimedOut { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Refused { .. } => ErrorCode::new(1, 1),
            Self::TimedOut { .. } => ErrorCode::new(1, 2),
            Self::EndpointNotFound { .. } => ErrorCode::new(1, 3),
            Self::InvalidEndpoint { .. } => ErrorCode::new(1, 4),
            Self::NoSuitableEndpoint { .. } => ErrorCode::new(1, 5),
            Self::SessionFailed { .. } => ErrorCode::new(1, 6),
            Self::NotConnected => ErrorCode::new(1, 7),
        }
    }
}

// =============================================================================
// ReadError
// =============================================================================

/// Value read errors.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The read call failed at the transport level.
    #[error("Read failed for '{node_id}': {message}")]
    Failed {
        /// Node that was read.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// The server answered with a non-good status.
    #[error("Bad status for '{node_id}': 0x{status_code:08X}")]
    BadStatus {
        /// Node that was read.
        node_id: String,
        /// OPC UA status code.
        status_code: u32,
    },

    /// The read did not complete within the bounded wait.
    #[error("Read of '{node_id}' timed out after {duration:?}")]
    Timeout {
        /// Node that was read.
        node_id: String,
        /// Configured wait bound.
        duration: Duration,
    },

    /// The node could not be resolved in the server address space.
    #[error("Node not found: '{node_id}'")]
    NodeNotFound {
        /// Node that was looked up.
        node_id: String,
    },
}

impl ReadError {
    /// Creates a read failed error.
    pub fn failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a bad status error.
    pub fn bad_status(node_id: impl Into<String>, status_code: u32) -> Self {
        Self::BadStatus {
            node_id: node_id.into(),
            status_code,
        }
    }

    /// Creates a read timeout error.
    pub fn timeout(node_id: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            node_id: node_id.into(),
            duration,
        }
    }

    /// Creates a node not found error.
    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        Self::NodeNotFound {
            node_id: node_id.into(),
        }
    }

    /// Returns the node the failed read targeted.
    pub fn node_id(&self) -> &str {
        match self {
            Self::Failed { node_id, .. }
            | Self::BadStatus { node_id, .. }
            | Self::Timeout { node_id, .. }
            | Self::NodeNotFound { node_id } => node_id,
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Timeout { .. })
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Failed { .. } => ErrorCode::new(2, 1),
            Self::BadStatus { .. } => ErrorCode::new(2, 2),
            Self::Timeout { .. } => ErrorCode::new(2, 3),
            Self::NodeNotFound { .. } => ErrorCode::new(2, 4),
        }
    }
}

// =============================================================================
// RegistrationError
// =============================================================================

/// Subscription and monitored-item registration errors.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The manager already holds a live subscription.
    #[error("Subscription {subscription_id} is already registered")]
    AlreadyRegistered {
        /// Id of the held subscription.
        subscription_id: u32,
    },

    /// The server refused to create the subscription.
    #[error("Subscription creation failed: {message}")]
    SubscriptionFailed {
        /// Error message.
        message: String,
    },

    /// The monitored-item creation call failed as a whole.
    #[error("Monitored item request failed on subscription {subscription_id}: {message}")]
    RequestFailed {
        /// Subscription the items were requested on.
        subscription_id: u32,
        /// Error message.
        message: String,
    },

    /// A single monitored item came back with a non-good status.
    #[error("Monitored item for '{node_id}' rejected: 0x{status_code:08X}")]
    ItemRejected {
        /// Target node of the item.
        node_id: String,
        /// OPC UA status code.
        status_code: u32,
    },
}

impl RegistrationError {
    /// Creates a subscription creation failed error.
    pub fn subscription_failed(message: impl Into<String>) -> Self {
        Self::SubscriptionFailed {
            message: message.into(),
        }
    }

    /// Creates a monitored-item request failed error.
    pub fn request_failed(subscription_id: u32, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            subscription_id,
            message: message.into(),
        }
    }

    /// Creates an item rejected error.
    pub fn item_rejected(node_id: impl Into<String>, status_code: u32) -> Self {
        Self::ItemRejected {
            node_id: node_id.into(),
            status_code,
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SubscriptionFailed { .. } | Self::RequestFailed { .. }
        )
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::AlreadyRegistered { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::AlreadyRegistered { .. } => ErrorCode::new(3, 1),
            Self::SubscriptionFailed { .. } => ErrorCode::new(3, 2),
            Self::RequestFailed { .. } => ErrorCode::new(3, 3),
            Self::ItemRejected { .. } => ErrorCode::new(3, 4),
        }
    }
}

// =============================================================================
// TeardownError
// =============================================================================

/// Subscription deletion and disconnect errors.
///
/// These are never escalated past a log line.
#[derive(Debug, Error)]
pub enum TeardownError {
    /// Subscription deletion failed.
    #[error("Failed to delete subscription {subscription_id}: {message}")]
    DeleteFailed {
        /// Subscription that was being deleted.
        subscription_id: u32,
        /// Error message.
        message: String,
    },

    /// Session disconnect failed.
    #[error("Disconnect failed: {message}")]
    DisconnectFailed {
        /// Error message.
        message: String,
    },

    /// A teardown request did not finish in time.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// Operation name.
        operation: String,
        /// Wait bound.
        duration: Duration,
    },
}

impl TeardownError {
    /// Creates a delete failed error.
    pub fn delete_failed(subscription_id: u32, message: impl Into<String>) -> Self {
        Self::DeleteFailed {
            subscription_id,
            message: message.into(),
        }
    }

    /// Creates a disconnect failed error.
    pub fn disconnect_failed(message: impl Into<String>) -> Self {
        Self::DisconnectFailed {
            message: message.into(),
        }
    }

    /// Creates a teardown timeout error.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::DeleteFailed { .. } => ErrorCode::new(4, 1),
            Self::DisconnectFailed { .. } => ErrorCode::new(4, 2),
            Self::Timeout { .. } => ErrorCode::new(4, 3),
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Configuration and identifier errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A required field is missing.
    #[error("Missing required field: '{field}'")]
    MissingField {
        /// Field name.
        field: String,
    },

    /// Endpoint URL is malformed.
    #[error("Invalid endpoint '{url}': {reason}")]
    InvalidEndpoint {
        /// The URL.
        url: String,
        /// Reason.
        reason: String,
    },

    /// A field has an out-of-range value.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Reason.
        reason: String,
    },

    /// A node identifier string could not be parsed.
    #[error("Invalid node id '{input}': {reason}")]
    InvalidNodeId {
        /// Input string.
        input: String,
        /// Reason.
        reason: String,
    },
}

impl ConfigurationError {
    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid node id error.
    pub fn invalid_node_id(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingField { .. } => ErrorCode::new(5, 1),
            Self::InvalidEndpoint { .. } => ErrorCode::new(5, 2),
            Self::InvalidValue { .. } => ErrorCode::new(5, 3),
            Self::InvalidNodeId { .. } => ErrorCode::new(5, 4),
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code for categorization.
///
/// Format: `UA-XXYY` where XX is category and YY is specific error.
///
/// Categories:
/// - 1: Connection
/// - 2: Read
/// - 3: Registration
/// - 4: Teardown
/// - 5: Configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category (1-5).
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }

    /// Returns the full error code as a u16.
    pub fn as_u16(&self) -> u16 {
        ((self.category as u16) << 8) | (self.code as u16)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UA-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Result Type
// =============================================================================

/// Result type for observation operations.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

// =============================================================================
// Tests
// =============================================================================

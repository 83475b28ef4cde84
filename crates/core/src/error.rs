//! Error types for Trellis.

use alloc::string::String;
use core::fmt;

/// Result type alias for Trellis operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for reactive and template operations.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// A scheduled update task failed.
    Task {
        message: String,
    },
    /// The HTML policy was configured more than once.
    PolicyAlreadySet,
    /// Arrays were observed before array observation was enabled.
    ArrayObservationDisabled,
    /// The value has no identity and cannot carry a notifier.
    NotObservable {
        kind: &'static str,
    },
    /// An invalid DOM tree operation.
    HierarchyRequest {
        message: String,
    },
    /// Invalid operation.
    InvalidOperation {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Task { message } => write!(f, "Update task failed: {}", message),
            Error::PolicyAlreadySet => write!(f, "The HTML policy can only be set once."),
            Error::ArrayObservationDisabled => {
                write!(f, "Must call enable_array_observation before observing arrays.")
            }
            Error::NotObservable { kind } => {
                write!(f, "Values of kind {} cannot be observed", kind)
            }
            Error::HierarchyRequest { message } => {
                write!(f, "Hierarchy request error: {}", message)
            }
            Error::InvalidOperation { message } => {
                write!(f, "Invalid operation: {}", message)
            }
        }
    }
}

impl core::error::Error for Error {}

impl Error {
    /// Creates a task failure error.
    pub fn task(message: impl Into<String>) -> Self {
        Error::Task {
            message: message.into(),
        }
    }

    /// Creates a not-observable error for the given value kind.
    pub fn not_observable(kind: &'static str) -> Self {
        Error::NotObservable { kind }
    }

    /// Creates a hierarchy request error.
    pub fn hierarchy_request(message: impl Into<String>) -> Self {
        Error::HierarchyRequest {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }
}

/*!
 * Error types for UCXSync
 */

use std::fmt;
use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, UcxError>;

#[derive(Debug)]
pub enum UcxError {
    /// Source path does not exist (surfaced only at roots; missing subdirectories
    /// deeper in a (node, share) tree are not errors, see `task::PerSourceTask`).
    SourceNotFound(PathBuf),

    /// Generic I/O error.
    Io(io::Error),

    /// The destination filesystem does not have enough free space for a pass.
    InsufficientDiskSpace { required: u64, available: u64 },

    /// A configuration value failed validation.
    Config(String),

    /// `Start` was called while the engine was already running.
    AlreadyRunning,

    /// The destination root directory could not be created on `Start`.
    DestinationCreateFailed(PathBuf, io::Error),

    /// Catch-all for conditions that don't warrant a dedicated variant.
    Other(String),
}

impl UcxError {
    /// Whether this error should abort the operation rather than being retried
    /// on the next sync-loop pass.
    pub fn is_fatal(&self) -> bool {
        match self {
            UcxError::SourceNotFound(_) => true,
            UcxError::Config(_) => true,
            UcxError::AlreadyRunning => true,
            UcxError::DestinationCreateFailed(_, _) => true,
            UcxError::InsufficientDiskSpace { .. } => true,
            UcxError::Io(_) => false,
            UcxError::Other(_) => false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            UcxError::SourceNotFound(_) => ErrorCategory::Validation,
            UcxError::Io(_) => ErrorCategory::IoError,
            UcxError::InsufficientDiskSpace { .. } => ErrorCategory::Resource,
            UcxError::Config(_) => ErrorCategory::Configuration,
            UcxError::AlreadyRunning => ErrorCategory::Lifecycle,
            UcxError::DestinationCreateFailed(_, _) => ErrorCategory::IoError,
            UcxError::Other(_) => ErrorCategory::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    IoError,
    Resource,
    Configuration,
    Lifecycle,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Resource => write!(f, "resource"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Lifecycle => write!(f, "lifecycle"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

impl fmt::Display for UcxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UcxError::SourceNotFound(path) => write!(f, "source not found: {}", path.display()),
            UcxError::Io(err) => write!(f, "I/O error: {}", err),
            UcxError::InsufficientDiskSpace {
                required,
                available,
            } => write!(
                f,
                "insufficient disk space: {} bytes required, {} bytes available",
                required, available
            ),
            UcxError::Config(msg) => write!(f, "configuration error: {}", msg),
            UcxError::AlreadyRunning => write!(f, "engine is already running"),
            UcxError::DestinationCreateFailed(path, err) => write!(
                f,
                "failed to create destination {}: {}",
                path.display(),
                err
            ),
            UcxError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for UcxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UcxError::Io(err) => Some(err),
            UcxError::DestinationCreateFailed(_, err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for UcxError {
    fn from(err: io::Error) -> Self {
        UcxError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors() {
        assert!(UcxError::SourceNotFound(PathBuf::from("/tmp")).is_fatal());
        assert!(UcxError::Config("bad".to_string()).is_fatal());
        assert!(UcxError::AlreadyRunning.is_fatal());
    }

    #[test]
    fn non_fatal_errors() {
        assert!(!UcxError::Io(io::Error::new(io::ErrorKind::Other, "x")).is_fatal());
        assert!(!UcxError::Other("x".to_string()).is_fatal());
    }

    #[test]
    fn categories() {
        assert_eq!(UcxError::AlreadyRunning.category(), ErrorCategory::Lifecycle);
        assert_eq!(
            UcxError::InsufficientDiskSpace {
                required: 10,
                available: 5
            }
            .category(),
            ErrorCategory::Resource
        );
    }

    #[test]
    fn display_messages() {
        let err = UcxError::InsufficientDiskSpace {
            required: 100,
            available: 50,
        };
        assert_eq!(
            err.to_string(),
            "insufficient disk space: 100 bytes required, 50 bytes available"
        );
    }
}

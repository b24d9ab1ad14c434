//! Unified error handling for the path-matcher library.
//!
//! Matching and recording failures are returned as typed outcomes. Store
//! failures are surfaced through the same type so callers can tell "nothing
//! saved" apart from "could not read the store".

use std::fmt;

/// Unified error type for path-matcher operations.
#[derive(Debug, Clone, PartialEq)]
pub enum PathMatchError {
    /// The platform has not granted live-location permission
    PermissionDenied,
    /// The location source could not produce a reading
    LocationUnavailable,
    /// No recorded path connects the two query points within tolerance
    NoConnectingPath {
        /// Whether the coarsened (rounded) current location was also tried
        retried_rounded: bool,
    },
    /// No point of interest is stored under this name
    PointNotFound { name: String },
    /// Caller-supplied input was rejected (e.g. blank point name)
    InvalidInput { message: String },
    /// The persistent store could not be read
    StoreRead { message: String },
    /// The persistent store rejected a write
    StoreWrite { message: String },
}

impl fmt::Display for PathMatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathMatchError::PermissionDenied => {
                write!(f, "Location permission has not been granted")
            }
            PathMatchError::LocationUnavailable => {
                write!(f, "Could not get current location")
            }
            PathMatchError::NoConnectingPath { retried_rounded } => {
                if *retried_rounded {
                    write!(
                        f,
                        "No connecting path found between these points (even with nearby location)"
                    )
                } else {
                    write!(f, "No connecting path found between these points")
                }
            }
            PathMatchError::PointNotFound { name } => {
                write!(f, "No point of interest named '{}'", name)
            }
            PathMatchError::InvalidInput { message } => {
                write!(f, "Invalid input: {}", message)
            }
            PathMatchError::StoreRead { message } => {
                write!(f, "Store read error: {}", message)
            }
            PathMatchError::StoreWrite { message } => {
                write!(f, "Store write error: {}", message)
            }
        }
    }
}

impl std::error::Error for PathMatchError {}

#[cfg(feature = "persistence")]
impl From<rusqlite::Error> for PathMatchError {
    fn from(err: rusqlite::Error) -> Self {
        PathMatchError::StoreRead {
            message: err.to_string(),
        }
    }
}

/// Result type alias for path-matcher operations.
pub type Result<T> = std::result::Result<T, PathMatchError>;

/// Extension trait for converting Option to PathMatchError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a point-not-found error.
    fn ok_or_point_not_found(self, name: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_point_not_found(self, name: &str) -> Result<T> {
        self.ok_or_else(|| PathMatchError::PointNotFound {
            name: name.to_string(),
        })
    }
}

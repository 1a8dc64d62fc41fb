use std::path::PathBuf;

use thiserror::Error;

use crate::memory::Allocation;
use crate::random::ValueCategory;

/// Error type for the test harness
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid allocation mode '{0}': expected one of 'cuda', 'pool' or 'managed'")]
    InvalidAllocationMode(String),

    #[error("invalid test options: {0}")]
    Options(String),

    #[error("allocator initialization failed: {0}")]
    AllocatorInit(String),

    #[error("allocator finalization failed: {0}")]
    AllocatorFinalize(String),

    #[error("allocator is not available: {0}")]
    AllocatorUnavailable(String),

    #[error("allocation error: {0}")]
    Allocation(String),

    /// The rejected allocation is carried back to the caller
    #[error("allocation {} does not belong to this memory resource", .0.id())]
    ForeignAllocation(Box<Allocation>),

    #[error("failed to create temporary directory under {}", root.display())]
    TempDirCreation {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error")]
    Io(#[source] std::io::Error),

    #[error("invalid range [{lower}, {upper}]: {reason}")]
    InvalidRange {
        lower: String,
        upper: String,
        reason: String,
    },

    #[error("an explicit range is not applicable to {0:?} values")]
    RangeNotApplicable(ValueCategory),

    #[error("environment '{environment}' cannot {action} while {state}")]
    InvalidState {
        environment: String,
        action: &'static str,
        state: &'static str,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of [`Error`] values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unrecognized or malformed configuration. Fatal before any test runs.
    Configuration,
    /// Allocator subsystem failure during initialization, use or finalization.
    Resource,
    /// Filesystem failure while preparing the run.
    Filesystem,
    /// Misuse of a harness API (bad range, wrong lifecycle state).
    Usage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidAllocationMode(_) | Error::Options(_) => ErrorKind::Configuration,
            Error::AllocatorInit(_)
            | Error::AllocatorFinalize(_)
            | Error::AllocatorUnavailable(_)
            | Error::Allocation(_) => ErrorKind::Resource,
            Error::TempDirCreation { .. } | Error::Io(_) => ErrorKind::Filesystem,
            Error::InvalidRange { .. }
            | Error::RangeNotApplicable(_)
            | Error::InvalidState { .. }
            | Error::ForeignAllocation(_) => ErrorKind::Usage,
        }
    }

    /// Takes back the allocation refused by a resource it did not come from
    pub fn into_allocation(self) -> Option<Allocation> {
        match self {
            Error::ForeignAllocation(allocation) => Some(*allocation),
            _ => None,
        }
    }

    /// Whether the error must abort the whole test run
    pub fn is_fatal(&self) -> bool {
        self.kind() != ErrorKind::Usage
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<clap::Error> for Error {
    fn from(err: clap::Error) -> Self {
        Error::Options(err.to_string())
    }
}

//! Typed database errors.
//!
//! Most failures in this crate are plain `eyre` reports carrying path and
//! line context. The two outcomes callers are expected to branch on —
//! "the path does not resolve to what you asked for" and "the mount target
//! already exists" — are carried as a [`DatabaseError`] value inside the
//! report, so they survive `wrap_err` chains and can be recovered with
//! [`DatabaseError::kind_of`].

use eyre::Report;
use thiserror::Error;

/// Category of a [`DatabaseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The path did not resolve to the requested entity kind: a missing
    /// song, a missing parent for a mount, or a non-mount unmount target.
    NotFound,
    /// The mount target already exists.
    Conflict,
}

/// A database error with a machine-checkable kind.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DatabaseError {
    kind: ErrorKind,
    message: String,
}

impl DatabaseError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::NotFound,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Conflict,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Extracts the kind from an `eyre` report, if the root cause is a
    /// `DatabaseError`.
    pub fn kind_of(report: &Report) -> Option<ErrorKind> {
        report.downcast_ref::<DatabaseError>().map(|e| e.kind)
    }
}

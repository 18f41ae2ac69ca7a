//! Structured error hierarchy
//!
//! One umbrella error per crate, `thiserror`-derived, with `#[from]`
//! delegation to per-concern sub-errors. Mirrors the error kinds named in
//! the reconciliation design: parse, validation, external-service,
//! integrity, and idempotency.
//!
//! `Idempotent` is not really a failure; callers treat it as `Ok(Skipped)`
//! rather than propagating it, but it is represented here so every
//! short-circuit path goes through one `Result` type instead of a mix of
//! `Result` and ad-hoc booleans.

use thiserror::Error;

/// Top-level error type for the reconciliation engine.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// A single record could not be validated against its preconditions
    /// (rollup-amount mismatch, missing ACTIVE reference, unknown short
    /// name). The record is abandoned; earlier records in the same file
    /// keep their committed effects.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A fatal integrity violation: two effective CfsAccounts for the same
    /// (account, method), or a Credit whose cfs_site matches no known
    /// payment method. The whole file is aborted.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// A file, NSF event, or PAID row was already processed. Not an error
    /// in the usual sense; logged at info and treated as a no-op.
    #[error("already processed: {0}")]
    Idempotent(String),

    /// The CFS HTTP facade reported a failure.
    #[error("CFS client error: {0}")]
    CfsClient(String),

    /// The storage gateway reported a failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// The object store reported a failure.
    #[error("object store error: {0}")]
    ObjectStore(String),

    /// The event bus reported a failure.
    #[error("event bus error: {0}")]
    Bus(String),

    /// An entity transition was attempted from a state that does not
    /// permit it.
    #[error("invalid transition on {entity} {id}: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        from: String,
        to: String,
    },
}

impl ReconcileError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    pub fn idempotent(msg: impl Into<String>) -> Self {
        Self::Idempotent(msg.into())
    }

    /// Kind 4 integrity violations are the only variant that must never be
    /// swallowed by a per-record catch loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }

    pub fn is_idempotent(&self) -> bool {
        matches!(self, Self::Idempotent(_))
    }
}

/// A single line-level parse failure, carried alongside (not instead of)
/// whatever records a parser did manage to produce.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct LineError {
    pub line: usize,
    pub reason: String,
}

impl LineError {
    pub fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

/// Parsers never throw on a single bad field; they accumulate. `records`
/// may be non-empty even when `errors` is non-empty (e.g. a TDI17 detail
/// line with one broken field still yields the rest of the fields).
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome<T> {
    pub records: Vec<T>,
    pub errors: Vec<LineError>,
}

impl<T> ParseOutcome<T> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn push_record(&mut self, record: T) {
        self.records.push(record);
    }

    pub fn push_error(&mut self, line: usize, reason: impl Into<String>) {
        self.errors.push(LineError::new(line, reason));
    }
}

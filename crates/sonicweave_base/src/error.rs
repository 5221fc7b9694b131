//! Error types with source location tracking.
//!
//! Every evaluation error in SonicWeave carries a [`Span`] indicating where in
//! the source text it occurred (errors raised deep inside a broadcast or a
//! native builtin may fall back to [`Span::default`]) plus an [`ErrorKind`]
//! classifying the failure.
//!
//! # Example
//!
//! ```
//! use sonicweave_base::{EvalError, ErrorKind, Span};
//!
//! let err = EvalError::new(ErrorKind::Name, "b is not defined", Span::new(0, 1));
//! assert!(err.to_string().contains("b is not defined"));
//! ```

use crate::span::Span;
use std::fmt;

/// Coarse classification of evaluation failures.
///
/// Every kind but [`ErrorKind::Gas`] is catchable by user `try`/`catch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operator or function applied to incompatible value kinds.
    Type,
    /// Logarithmic/linear domain mixed without coercion.
    Domain,
    /// Relative/absolute echelon mismatch without a unison frequency.
    Echelon,
    /// Division by zero, non-integer required, empty pop, and similar.
    Value,
    /// Unbound identifier.
    Name,
    /// Array/slice/record key out of range.
    Index,
    /// Too few/many arguments, or a missing required parameter.
    Arity,
    /// Gas budget exhausted. Bypasses `catch`, but `finally`/`defer` still run.
    Gas,
    /// Anything raised with `throw expr`.
    User,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Type => "TypeError",
            ErrorKind::Domain => "DomainError",
            ErrorKind::Echelon => "EchelonError",
            ErrorKind::Value => "ValueError",
            ErrorKind::Name => "NameError",
            ErrorKind::Index => "IndexError",
            ErrorKind::Arity => "ArityError",
            ErrorKind::Gas => "OutOfGasError",
            ErrorKind::User => "Error",
        };
        f.write_str(name)
    }
}

/// An error annotated with its kind and source location.
#[derive(Debug, Clone)]
pub struct EvalError {
    /// Which family of failure this is.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Location in source where the error occurred.
    pub span: Span,
}

impl EvalError {
    /// Creates an error with the given kind, message and source location.
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }

    /// Shorthand for an [`ErrorKind::Type`] error with no known span.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message, Span::default())
    }

    /// Shorthand for an [`ErrorKind::Domain`] error with no known span.
    pub fn domain_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Domain, message, Span::default())
    }

    /// Shorthand for an [`ErrorKind::Echelon`] error with no known span.
    pub fn echelon_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Echelon, message, Span::default())
    }

    /// Shorthand for an [`ErrorKind::Value`] error with no known span.
    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Value, message, Span::default())
    }

    /// Shorthand for an [`ErrorKind::Name`] error with no known span.
    pub fn name_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Name, message, Span::default())
    }

    /// Shorthand for an [`ErrorKind::Index`] error with no known span.
    pub fn index_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Index, message, Span::default())
    }

    /// Shorthand for an [`ErrorKind::Arity`] error with no known span.
    pub fn arity_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Arity, message, Span::default())
    }

    /// The uncatchable out-of-gas error.
    pub fn out_of_gas() -> Self {
        Self::new(ErrorKind::Gas, "out of gas", Span::default())
    }

    /// Whether user code is allowed to catch this error with `try`/`catch`.
    pub fn is_catchable(&self) -> bool {
        !matches!(self.kind, ErrorKind::Gas)
    }

    /// Attaches (or overwrites) the span this error is reported at.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} at {}..{}", self.kind, self.message, self.span.start, self.span.end)
    }
}

impl std::error::Error for EvalError {}

/// Alias for `std::result::Result<T, EvalError>`.
pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_error_display_includes_kind_and_message() {
        let err = EvalError::new(ErrorKind::Value, "division by zero", Span::new(5, 10));
        let display = format!("{}", err);
        assert!(display.contains("ValueError"));
        assert!(display.contains("division by zero"));
        assert!(display.contains("5..10"));
    }

    #[test]
    fn gas_error_is_not_catchable() {
        assert!(!EvalError::out_of_gas().is_catchable());
    }

    #[test]
    fn everything_else_is_catchable() {
        assert!(EvalError::name_error("x").is_catchable());
        assert!(EvalError::type_error("x").is_catchable());
    }
}

//! Unified error interface for dossier.
//!
//! All dossier error types implement [`ErrorCode`] to provide:
//!
//! - **Machine-readable codes**: for programmatic error handling
//! - **Recoverability info**: for retry logic and operator feedback
//!
//! # Code Format
//!
//! Error codes are UPPER_SNAKE_CASE with a per-crate prefix and are
//! stable once defined (API contract):
//!
//! | Prefix | Crate |
//! |--------|-------|
//! | `BUS_` | dossier-bus |
//! | `LOCKER_` | dossier-locker |
//! | `CONTROL_` | dossier-control |
//! | `GATEWAY_` | dossier-gateway |
//!
//! # Recoverability
//!
//! An error is **recoverable** when retrying may succeed or the caller
//! can take corrective action: a permission denial clears once the
//! predecessor section is approved, a handoff timeout clears when the
//! grant is re-requested. Order violations and manifest corruption are
//! not recoverable; they are surfaced to the operator instead.
//!
//! # Example
//!
//! ```
//! use dossier_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Denied,
//!     Corrupt,
//! }
//!
//! impl ErrorCode for MyError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::Denied => "MY_DENIED",
//!             Self::Corrupt => "MY_CORRUPT",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Denied)
//!     }
//! }
//!
//! let err = MyError::Denied;
//! assert_eq!(err.code(), "MY_DENIED");
//! assert!(err.is_recoverable());
//! ```

/// Unified error code interface.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    ///
    /// UPPER_SNAKE_CASE, prefixed with the owning crate's domain, and
    /// stable across versions (changing a code is a breaking change).
    fn code(&self) -> &'static str;

    /// Returns whether the error is recoverable.
    ///
    /// - `true`: retry may succeed, or the caller can take corrective action
    /// - `false`: retry will not help; surface to the operator
    fn is_recoverable(&self) -> bool;
}

/// Validates that an error code follows dossier conventions.
///
/// # Checks
///
/// 1. Code is not empty
/// 2. Code starts with the expected prefix
/// 3. Code is UPPER_SNAKE_CASE
///
/// # Panics
///
/// Panics with a descriptive message if validation fails. Intended for
/// use in tests.
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "Error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "Error code '{}' must start with prefix '{}'",
        code,
        expected_prefix
    );
    assert!(
        is_upper_snake_case(code),
        "Error code '{}' must be UPPER_SNAKE_CASE",
        code
    );
}

/// Validates multiple error codes at once.
///
/// Use this to verify all variants of an error enum:
///
/// ```
/// use dossier_types::{ErrorCode, assert_error_codes};
///
/// #[derive(Debug)]
/// enum MyError { A, B }
///
/// impl ErrorCode for MyError {
///     fn code(&self) -> &'static str {
///         match self {
///             Self::A => "MY_A",
///             Self::B => "MY_B",
///         }
///     }
///     fn is_recoverable(&self) -> bool { false }
/// }
///
/// assert_error_codes(&[MyError::A, MyError::B], "MY_");
/// ```
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

/// Checks if a string is UPPER_SNAKE_CASE.
fn is_upper_snake_case(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    if s.starts_with('_') || s.ends_with('_') {
        return false;
    }
    if s.contains("__") {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

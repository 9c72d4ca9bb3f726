//! Unified error interface for OMS.
//!
//! Every error enum in the workspace implements [`ErrorCode`], giving
//! callers (the shell, the HTTP views) a stable machine-readable code and
//! a hint whether retrying could help.
//!
//! # Example
//!
//! ```
//! use oms_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum LookupError {
//!     Missing(String),
//!     Busy,
//! }
//!
//! impl ErrorCode for LookupError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::Missing(_) => "LOOKUP_MISSING",
//!             Self::Busy => "LOOKUP_BUSY",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Busy)
//!     }
//! }
//!
//! assert_eq!(LookupError::Busy.code(), "LOOKUP_BUSY");
//! assert!(!LookupError::Missing("x".into()).is_recoverable());
//! ```

/// Machine-readable error code interface.
///
/// # Code Format
///
/// - **UPPER_SNAKE_CASE**, e.g. `"ACCESS_UNAUTHORIZED"`
/// - **Prefixed by layer**: `ACCESS_`, `MODEL_`, `CONFIG_`, ...
/// - **Stable**: codes are part of the API contract
///
/// # Recoverability
///
/// Permission and shape errors (`Unauthorized`, `UndeclaredAttribute`,
/// `ContainmentRejected`) are never recoverable: retrying the same call
/// with the same principal cannot succeed.
pub trait ErrorCode {
    /// Returns the machine-readable error code.
    fn code(&self) -> &'static str;

    /// Returns whether retrying may succeed.
    fn is_recoverable(&self) -> bool;
}

/// Validates that an error code follows OMS conventions.
///
/// # Panics
///
/// Panics if the code is empty, lacks `expected_prefix`, or is not
/// UPPER_SNAKE_CASE. Intended for tests.
///
/// ```
/// use oms_types::{ErrorCode, assert_error_code};
///
/// struct Timeout;
/// impl ErrorCode for Timeout {
///     fn code(&self) -> &'static str { "STORE_TIMEOUT" }
///     fn is_recoverable(&self) -> bool { true }
/// }
///
/// assert_error_code(&Timeout, "STORE_");
/// ```
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "Error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "Error code '{code}' must start with prefix '{expected_prefix}'"
    );
    assert!(
        is_upper_snake_case(code),
        "Error code '{code}' must be UPPER_SNAKE_CASE"
    );
}

/// Validates every variant of an error enum at once.
///
/// # Panics
///
/// Panics on the first invalid code, see [`assert_error_code`].
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('_')
        && !s.ends_with('_')
        && !s.contains("__")
        && s
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl ErrorCode for TestError {
        fn code(&self) -> &'static str {
            match self {
                Self::Transient => "TEST_TRANSIENT",
                Self::Permanent => "TEST_PERMANENT",
            }
        }

        fn is_recoverable(&self) -> bool {
            matches!(self, Self::Transient)
        }
    }

    #[test]
    fn assert_error_codes_all_variants() {
        assert_error_codes(&[TestError::Transient, TestError::Permanent], "TEST_");
        assert!(TestError::Transient.is_recoverable());
        assert!(!TestError::Permanent.is_recoverable());
    }

    #[test]
    #[should_panic(expected = "must start with prefix")]
    fn assert_error_code_wrong_prefix() {
        assert_error_code(&TestError::Transient, "MODEL_");
    }

    #[test]
    fn upper_snake_case_rules() {
        assert!(is_upper_snake_case("ACCESS_UNAUTHORIZED"));
        assert!(is_upper_snake_case("E2"));
        assert!(!is_upper_snake_case(""));
        assert!(!is_upper_snake_case("access"));
        assert!(!is_upper_snake_case("_ACCESS"));
        assert!(!is_upper_snake_case("ACCESS__DENIED"));
    }
}

//! Request validation
//!
//! Rules collect every failure instead of stopping at the first one, so the
//! client sees all bad fields in a single 400.

use std::fmt;

use kernel::error::app_error::AppError;

/// A single failed rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Accumulated validation failures
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// Fails when `value` is blank
    pub fn required(&mut self, field: &'static str, value: &str, message: &str) -> bool {
        if value.trim().is_empty() {
            self.add(field, message);
            false
        } else {
            true
        }
    }

    /// Fails when `value` is longer than `max` characters
    pub fn max_len(&mut self, field: &'static str, value: &str, max: usize, message: &str) {
        if value.chars().count() > max {
            self.add(field, message);
        }
    }

    /// Fails when `condition` does not hold
    pub fn ensure(&mut self, field: &'static str, condition: bool, message: &str) {
        if !condition {
            self.add(field, message);
        }
    }

    /// Record a failure produced by a value-object constructor
    pub fn check<T, E: fmt::Display>(&mut self, field: &'static str, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.add(field, e.to_string());
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::bad_request(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_every_failure() {
        let mut v = ValidationErrors::new();
        v.required("email", " ", "Email is required.");
        v.max_len("firstName", &"x".repeat(51), 50, "First name must not exceed 50 characters.");
        v.ensure("pageSize", true, "unused");

        assert_eq!(v.errors().len(), 2);
        let err: AppError = v.into_result().unwrap_err().into();
        assert_eq!(err.status_code(), 400);
        assert!(err.message().contains("email: Email is required."));
        assert!(err.message().contains("firstName:"));
    }

    #[test]
    fn test_empty_is_ok() {
        let mut v = ValidationErrors::new();
        assert!(v.required("name", "Travel", "Name is required."));
        assert!(v.into_result().is_ok());
    }
}

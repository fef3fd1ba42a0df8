//! Authentication error types.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::backend::{DocumentStoreError, IdentityError};

/// Errors that can occur during authentication operations.
///
/// These never reach the client: the service logs them and reports either
/// form errors or a failed outcome.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Identity provider error.
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Profile lookup or insert failed.
    #[error("profile store error: {0}")]
    Documents(#[from] DocumentStoreError),
}

/// A form field that can carry a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FormField {
    FirstName,
    LastName,
    Email,
    Password,
    PasswordConfirmation,
}

/// Why a field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldError {
    /// Empty.
    Required,
    /// Malformed email, or a confirmation that does not match.
    Validate,
    /// Shorter than the minimum length.
    MinLength,
    /// Email and password do not match an account.
    Mismatch,
    /// An account with this email already exists.
    AlreadyInUse,
}

impl FieldError {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Validate => "validate",
            Self::MinLength => "minLength",
            Self::Mismatch => "mismatch",
            Self::AlreadyInUse => "alreadyInUse",
        }
    }
}

/// Per-field form errors, serialized as `{"email": "mismatch", ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<FormField, FieldError>);

impl FormErrors {
    /// Record an error on a field, replacing any earlier one.
    pub fn insert(&mut self, field: FormField, error: FieldError) {
        self.0.insert(field, error);
    }

    /// The error recorded on a field.
    #[must_use]
    pub fn get(&self, field: FormField) -> Option<FieldError> {
        self.0.get(&field).copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(())` when no field has an error.
    ///
    /// # Errors
    ///
    /// Returns `self` when any field has an error.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, error)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field:?}: {}", error.as_str())?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_form_errors_serialize_by_field() {
        let mut errors = FormErrors::default();
        errors.insert(FormField::Password, FieldError::Mismatch);
        errors.insert(FormField::Email, FieldError::Mismatch);
        errors.insert(FormField::PasswordConfirmation, FieldError::Validate);

        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({
                "email": "mismatch",
                "password": "mismatch",
                "passwordConfirmation": "validate"
            })
        );
    }

    #[test]
    fn test_display_and_result() {
        assert!(FormErrors::default().into_result().is_ok());

        let mut errors = FormErrors::default();
        errors.insert(FormField::Email, FieldError::AlreadyInUse);
        assert_eq!(errors.to_string(), "Email: alreadyInUse");
        assert!(errors.into_result().is_err());
    }
}

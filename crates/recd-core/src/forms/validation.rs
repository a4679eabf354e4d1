use std::fmt;

use thiserror::Error;

/// Maximum input lengths, per field
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MAX_PASSWORD_LENGTH: usize = 128;
pub const MAX_NAME_LENGTH: usize = 64;

/// Minimum password length accepted at signup
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Longest local part (before the `@`) we accept
const MAX_EMAIL_LOCAL_LENGTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    DisplayName,
    Email,
    Password,
    ConfirmPassword,
}

impl Field {
    pub fn label(&self) -> &'static str {
        match self {
            Field::DisplayName => "Name",
            Field::Email => "Email",
            Field::Password => "Password",
            Field::ConfirmPassword => "Confirm password",
        }
    }

    pub fn max_length(&self) -> usize {
        match self {
            Field::DisplayName => MAX_NAME_LENGTH,
            Field::Email => MAX_EMAIL_LENGTH,
            Field::Password | Field::ConfirmPassword => MAX_PASSWORD_LENGTH,
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, Field::Password | Field::ConfirmPassword)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A field-level problem found before anything is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(Field),

    #[error("Enter a valid email address")]
    InvalidEmail,

    #[error("{field} must be at least {min} characters")]
    TooShort { field: Field, min: usize },

    #[error("Passwords do not match")]
    Mismatch,
}

impl ValidationError {
    pub fn field(&self) -> Field {
        match self {
            ValidationError::Required(field) => *field,
            ValidationError::InvalidEmail => Field::Email,
            ValidationError::TooShort { field, .. } => *field,
            ValidationError::Mismatch => Field::ConfirmPassword,
        }
    }
}

/// Syntactic email check: one `@`, a sane local part, a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LENGTH || email.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || local.len() > MAX_EMAIL_LOCAL_LENGTH || domain.contains('@') {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    labels.iter().all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_alphanumeric() || c == '-')
    })
}

pub(crate) fn check_email(email: &str) -> Option<ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        Some(ValidationError::Required(Field::Email))
    } else if !is_valid_email(email) {
        Some(ValidationError::InvalidEmail)
    } else {
        None
    }
}

pub(crate) fn check_required(field: Field, value: &str) -> Option<ValidationError> {
    if value.trim().is_empty() {
        Some(ValidationError::Required(field))
    } else {
        None
    }
}

/// Check if a character should be accepted into `field` at `current_len`
pub fn can_add_char(field: Field, current_len: usize, c: char) -> bool {
    current_len < field.max_length() && !c.is_control()
}

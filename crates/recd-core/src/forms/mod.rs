//! Login and signup forms.
//!
//! A form owns its field values and inline errors. Submitting is split in
//! two so the request can run on another task:
//!
//! 1. `begin_submit` validates locally and takes the form's single
//!    in-flight slot, returning a submission.
//! 2. The submission's `run` calls the session store and, on success,
//!    navigates to the redirect target. Afterwards the caller hands the
//!    result back through `finish` so the form can show errors inline.
//!
//! While a submission is alive, further `begin_submit` calls fail with
//! [`SubmitError::Busy`].

pub mod login;
pub mod redirect;
pub mod signup;
pub mod validation;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::auth::AuthError;

pub use login::{LoginForm, LoginSubmission};
pub use redirect::{query_param, split_path, Navigator, RedirectTarget, ROOT_PATH};
pub use signup::{SignupForm, SignupSubmission};
pub use validation::{is_valid_email, Field, ValidationError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("A submission is already in progress")]
    Busy,

    #[error("Please fix the highlighted fields")]
    Invalid(Vec<ValidationError>),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// The single in-flight slot of a form instance.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    flag: Arc<AtomicBool>,
}

impl InFlight {
    pub(crate) fn try_acquire(&self) -> Option<SubmitGuard> {
        self.flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SubmitGuard {
                flag: Arc::clone(&self.flag),
            })
    }

    pub(crate) fn is_active(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Releases the in-flight slot when dropped.
#[derive(Debug)]
pub struct SubmitGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for SubmitGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Inline errors currently shown on a form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: Vec<ValidationError>,
    auth: Option<AuthError>,
}

impl FormErrors {
    pub fn field(&self, field: Field) -> Option<&ValidationError> {
        self.fields.iter().find(|e| e.field() == field)
    }

    pub fn fields(&self) -> &[ValidationError] {
        &self.fields
    }

    pub fn auth(&self) -> Option<&AuthError> {
        self.auth.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.auth.is_none()
    }

    pub(crate) fn set_fields(&mut self, fields: Vec<ValidationError>) {
        self.fields = fields;
    }

    pub(crate) fn set_auth(&mut self, auth: Option<AuthError>) {
        self.auth = auth;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Navigator;

    /// Records every path it is asked to navigate to.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingNavigator {
        pub paths: Vec<String>,
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&mut self, path: &str) {
            self.paths.push(path.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_single_slot() {
        let slot = InFlight::default();
        let guard = slot.try_acquire().unwrap();
        assert!(slot.is_active());
        assert!(slot.try_acquire().is_none());

        drop(guard);
        assert!(!slot.is_active());
        assert!(slot.try_acquire().is_some());
    }

    #[test]
    fn test_form_errors_lookup_by_field() {
        let mut errors = FormErrors::default();
        assert!(errors.is_empty());

        errors.set_fields(vec![ValidationError::InvalidEmail, ValidationError::Mismatch]);
        assert_eq!(errors.field(Field::Email), Some(&ValidationError::InvalidEmail));
        assert_eq!(errors.field(Field::Password), None);

        errors.set_auth(Some(AuthError::InvalidCredentials));
        assert!(errors.auth().is_some());
    }
}

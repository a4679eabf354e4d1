use std::fmt;

use tracing::debug;

use crate::auth::{AuthError, IdentityProvider, Session, SessionStore};

use super::validation::{can_add_char, check_email, check_required, Field, ValidationError};
use super::{FormErrors, InFlight, Navigator, RedirectTarget, SubmitError, SubmitGuard};

#[derive(Debug, Default)]
pub struct LoginForm {
    email: String,
    password: String,
    errors: FormErrors,
    redirect: RedirectTarget,
    in_flight: InFlight,
}

impl LoginForm {
    /// Fields in tab order
    pub const FIELDS: [Field; 2] = [Field::Email, Field::Password];

    pub fn new(redirect: RedirectTarget) -> Self {
        Self {
            redirect,
            ..Self::default()
        }
    }

    /// Pre-fill the email, e.g. from the last successful login.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn value(&self, field: Field) -> &str {
        match field {
            Field::Email => &self.email,
            Field::Password => &self.password,
            Field::DisplayName | Field::ConfirmPassword => "",
        }
    }

    fn value_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::Email => Some(&mut self.email),
            Field::Password => Some(&mut self.password),
            Field::DisplayName | Field::ConfirmPassword => None,
        }
    }

    /// Append a typed character. Returns false if it was refused.
    pub fn push_char(&mut self, field: Field, c: char) -> bool {
        match self.value_mut(field) {
            Some(value) if can_add_char(field, value.chars().count(), c) => {
                value.push(c);
                true
            }
            _ => false,
        }
    }

    pub fn pop_char(&mut self, field: Field) {
        if let Some(value) = self.value_mut(field) {
            value.pop();
        }
    }

    pub fn errors(&self) -> &FormErrors {
        &self.errors
    }

    pub fn redirect(&self) -> &RedirectTarget {
        &self.redirect
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_active()
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        [
            check_email(&self.email),
            check_required(Field::Password, &self.password),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Validate and claim the in-flight slot.
    ///
    /// A busy form keeps its current errors; otherwise field errors are
    /// replaced by the outcome of validation.
    pub fn begin_submit(&mut self) -> Result<LoginSubmission, SubmitError> {
        if self.is_submitting() {
            debug!("Login already in flight, ignoring submit");
            return Err(SubmitError::Busy);
        }

        let problems = self.validate();
        self.errors.set_fields(problems.clone());
        if !problems.is_empty() {
            return Err(SubmitError::Invalid(problems));
        }

        let guard = self.in_flight.try_acquire().ok_or(SubmitError::Busy)?;
        self.errors.set_auth(None);

        Ok(LoginSubmission {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            redirect: self.redirect.clone(),
            _guard: guard,
        })
    }

    /// Record the outcome of a submission. Field values survive a failure;
    /// the password is cleared after a success.
    pub fn finish(&mut self, result: &Result<Session, AuthError>) {
        match result {
            Ok(_) => {
                self.password.clear();
                self.errors = FormErrors::default();
            }
            Err(e) => self.errors.set_auth(Some(e.clone())),
        }
    }

    /// Validate, log in and redirect in one go.
    pub async fn submit<P, N>(
        &mut self,
        store: &SessionStore<P>,
        navigator: &mut N,
    ) -> Result<Session, SubmitError>
    where
        P: IdentityProvider,
        N: Navigator + ?Sized,
    {
        let submission = self.begin_submit()?;
        let result = submission.run(store, navigator).await;
        self.finish(&result);
        result.map_err(SubmitError::from)
    }
}

/// A validated login request holding the form's in-flight slot.
pub struct LoginSubmission {
    email: String,
    password: String,
    redirect: RedirectTarget,
    _guard: SubmitGuard,
}

impl fmt::Debug for LoginSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginSubmission")
            .field("email", &self.email)
            .field("redirect", &self.redirect)
            .finish_non_exhaustive()
    }
}

impl LoginSubmission {
    pub fn redirect(&self) -> &RedirectTarget {
        &self.redirect
    }

    /// Log in and navigate to the redirect target on success.
    pub async fn run<P, N>(
        self,
        store: &SessionStore<P>,
        navigator: &mut N,
    ) -> Result<Session, AuthError>
    where
        P: IdentityProvider,
        N: Navigator + ?Sized,
    {
        let session = store.login(&self.email, &self.password).await?;
        navigator.navigate(self.redirect.as_str());
        Ok(session)
    }
}

use std::fmt;

use tracing::debug;

use crate::auth::{AuthError, IdentityProvider, Session, SessionStore, SignupFields};

use super::validation::{
    can_add_char, check_email, check_required, Field, ValidationError, MIN_PASSWORD_LENGTH,
};
use super::{FormErrors, InFlight, Navigator, RedirectTarget, SubmitError, SubmitGuard};

#[derive(Debug, Default)]
pub struct SignupForm {
    fields: SignupFields,
    errors: FormErrors,
    redirect: RedirectTarget,
    in_flight: InFlight,
}

impl SignupForm {
    /// Fields in tab order
    pub const FIELDS: [Field; 4] = [
        Field::DisplayName,
        Field::Email,
        Field::Password,
        Field::ConfirmPassword,
    ];

    pub fn new(redirect: RedirectTarget) -> Self {
        Self {
            redirect,
            ..Self::default()
        }
    }

    pub fn value(&self, field: Field) -> &str {
        match field {
            Field::DisplayName => &self.fields.display_name,
            Field::Email => &self.fields.email,
            Field::Password => &self.fields.password,
            Field::ConfirmPassword => &self.fields.confirm_password,
        }
    }

    fn value_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::DisplayName => &mut self.fields.display_name,
            Field::Email => &mut self.fields.email,
            Field::Password => &mut self.fields.password,
            Field::ConfirmPassword => &mut self.fields.confirm_password,
        }
    }

    /// Append a typed character. Returns false if it was refused.
    pub fn push_char(&mut self, field: Field, c: char) -> bool {
        let value = self.value_mut(field);
        if can_add_char(field, value.chars().count(), c) {
            value.push(c);
            true
        } else {
            false
        }
    }

    pub fn pop_char(&mut self, field: Field) {
        self.value_mut(field).pop();
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
        let f = &self.fields;

        let password = if f.password.is_empty() {
            Some(ValidationError::Required(Field::Password))
        } else if f.password.chars().count() < MIN_PASSWORD_LENGTH {
            Some(ValidationError::TooShort {
                field: Field::Password,
                min: MIN_PASSWORD_LENGTH,
            })
        } else {
            None
        };

        let confirm = if f.confirm_password.is_empty() {
            Some(ValidationError::Required(Field::ConfirmPassword))
        } else if f.confirm_password != f.password {
            Some(ValidationError::Mismatch)
        } else {
            None
        };

        [
            check_required(Field::DisplayName, &f.display_name),
            check_email(&f.email),
            password,
            confirm,
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub fn begin_submit(&mut self) -> Result<SignupSubmission, SubmitError> {
        if self.is_submitting() {
            debug!("Signup already in flight, ignoring submit");
            return Err(SubmitError::Busy);
        }

        let problems = self.validate();
        self.errors.set_fields(problems.clone());
        if !problems.is_empty() {
            return Err(SubmitError::Invalid(problems));
        }

        let guard = self.in_flight.try_acquire().ok_or(SubmitError::Busy)?;
        self.errors.set_auth(None);

        let mut fields = self.fields.clone();
        fields.display_name = fields.display_name.trim().to_string();
        fields.email = fields.email.trim().to_string();

        Ok(SignupSubmission {
            fields,
            redirect: self.redirect.clone(),
            _guard: guard,
        })
    }

    /// Record the outcome of a submission; passwords are cleared on success.
    pub fn finish(&mut self, result: &Result<Session, AuthError>) {
        match result {
            Ok(_) => {
                self.fields.password.clear();
                self.fields.confirm_password.clear();
                self.errors = FormErrors::default();
            }
            Err(e) => self.errors.set_auth(Some(e.clone())),
        }
    }

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

pub struct SignupSubmission {
    fields: SignupFields,
    redirect: RedirectTarget,
    _guard: SubmitGuard,
}

impl fmt::Debug for SignupSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupSubmission")
            .field("fields", &self.fields)
            .field("redirect", &self.redirect)
            .finish_non_exhaustive()
    }
}

impl SignupSubmission {
    pub async fn run<P, N>(
        self,
        store: &SessionStore<P>,
        navigator: &mut N,
    ) -> Result<Session, AuthError>
    where
        P: IdentityProvider,
        N: Navigator + ?Sized,
    {
        let session = store.signup(&self.fields).await?;
        navigator.navigate(self.redirect.as_str());
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::store::testing::FakeProvider;
    use crate::auth::MemoryTokenStorage;
    use crate::forms::testing::RecordingNavigator;

    fn type_into(form: &mut SignupForm, field: Field, text: &str) {
        for c in text.chars() {
            form.push_char(field, c);
        }
    }

    fn filled(name: &str, email: &str, password: &str, confirm: &str) -> SignupForm {
        let mut form = SignupForm::new(RedirectTarget::parse("/results?artist=7"));
        type_into(&mut form, Field::DisplayName, name);
        type_into(&mut form, Field::Email, email);
        type_into(&mut form, Field::Password, password);
        type_into(&mut form, Field::ConfirmPassword, confirm);
        form
    }

    #[test]
    fn test_validation_covers_every_field() {
        let form = filled("", "bad", "short", "other");
        assert_eq!(
            form.validate(),
            vec![
                ValidationError::Required(Field::DisplayName),
                ValidationError::InvalidEmail,
                ValidationError::TooShort {
                    field: Field::Password,
                    min: MIN_PASSWORD_LENGTH
                },
                ValidationError::Mismatch,
            ]
        );
    }

    #[test]
    fn test_missing_confirmation_is_required_not_mismatch() {
        let form = filled("Fan", "new@example.com", "longenough", "");
        assert_eq!(
            form.validate(),
            vec![ValidationError::Required(Field::ConfirmPassword)]
        );
    }

    #[tokio::test]
    async fn test_signup_success_redirects_and_clears_passwords() {
        let store = SessionStore::new(FakeProvider::new(), Arc::new(MemoryTokenStorage::new()));
        let mut nav = RecordingNavigator::default();
        let mut form = filled(" New Fan ", "new@example.com", "longenough", "longenough");

        let session = form.submit(&store, &mut nav).await.unwrap();
        assert_eq!(session.greeting_name(), Some("New Fan"));
        assert_eq!(nav.paths, vec!["/results?artist=7".to_string()]);
        assert_eq!(form.value(Field::Password), "");
        assert_eq!(form.value(Field::ConfirmPassword), "");
        assert_eq!(form.value(Field::Email), "new@example.com");
    }

    #[tokio::test]
    async fn test_signup_rejection_shown_inline() {
        let store = SessionStore::new(FakeProvider::new(), Arc::new(MemoryTokenStorage::new()));
        let mut nav = RecordingNavigator::default();
        let mut form = filled("Fan", "fan@example.com", "longenough", "longenough");

        let err = form.submit(&store, &mut nav).await.unwrap_err();
        assert!(matches!(err, SubmitError::Auth(AuthError::Rejected(_))));
        assert!(matches!(form.errors().auth(), Some(AuthError::Rejected(_))));
        assert_eq!(form.value(Field::Password), "longenough");
        assert!(nav.paths.is_empty());
        assert!(!store.current_session().is_present());
    }

    #[test]
    fn test_busy_while_submission_alive() {
        let mut form = filled("Fan", "new@example.com", "longenough", "longenough");
        let first = form.begin_submit().unwrap();
        assert_eq!(form.begin_submit().unwrap_err(), SubmitError::Busy);
        drop(first);
        assert!(form.begin_submit().is_ok());
    }
}

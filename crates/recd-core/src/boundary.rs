//! Render-time error boundary.
//!
//! An [`ErrorBoundary`] wraps the render of a subtree. The first time the
//! subtree fails (returns a [`RenderError`] or panics) the boundary takes a
//! snapshot, reports it once, and from then on renders only the fallback.
//! There is no way back to `Healthy` short of [`ErrorBoundary::remount`].
//!
//! Only failures raised while rendering are caught. Errors from input
//! handlers and background tasks belong to their callers.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("{0}")]
    Failed(String),

    #[error("render panicked: {0}")]
    Panicked(String),
}

impl RenderError {
    pub fn msg(message: impl Into<String>) -> Self {
        RenderError::Failed(message.into())
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        RenderError::Panicked(message)
    }
}

impl From<anyhow::Error> for RenderError {
    fn from(err: anyhow::Error) -> Self {
        RenderError::Failed(format!("{:#}", err))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Error,
    Panic,
}

/// Where and when a render failure happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub boundary: String,
    pub kind: FailureKind,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSnapshot {
    pub error: RenderError,
    pub info: ErrorInfo,
}

/// External sink for captured render failures. Fire-and-forget.
pub trait ErrorReporter {
    fn error(&self, message: &str, error: &RenderError, context: &ErrorInfo);
}

/// Reports through `tracing` at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn error(&self, message: &str, err: &RenderError, context: &ErrorInfo) {
        error!(
            boundary = %context.boundary,
            kind = ?context.kind,
            error = %err,
            "{}",
            message
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryState {
    Healthy,
    Failed,
}

/// Outcome of one render pass through the boundary.
#[derive(Debug)]
pub enum Rendered<'a, T> {
    Children(T),
    Fallback(&'a ErrorSnapshot),
}

impl<T> Rendered<'_, T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Rendered::Fallback(_))
    }
}

pub struct ErrorBoundary<R = TracingReporter> {
    name: String,
    failure: Option<ErrorSnapshot>,
    reporter: R,
}

impl<R: ErrorReporter> ErrorBoundary<R> {
    pub fn new(name: impl Into<String>, reporter: R) -> Self {
        Self {
            name: name.into(),
            failure: None,
            reporter,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BoundaryState {
        if self.failure.is_some() {
            BoundaryState::Failed
        } else {
            BoundaryState::Healthy
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn snapshot(&self) -> Option<&ErrorSnapshot> {
        self.failure.as_ref()
    }

    /// Render the children, or the fallback once anything has failed.
    pub fn render<T, F>(&mut self, children: F) -> Rendered<'_, T>
    where
        F: FnOnce() -> Result<T, RenderError>,
    {
        match self.failure {
            Some(ref snapshot) => Rendered::Fallback(snapshot),
            None => {
                let (err, kind) = match panic::catch_unwind(AssertUnwindSafe(children)) {
                    Ok(Ok(value)) => return Rendered::Children(value),
                    Ok(Err(err)) => (err, FailureKind::Error),
                    Err(payload) => (RenderError::from_panic(payload), FailureKind::Panic),
                };
                let snapshot = self.capture(err, kind);
                Rendered::Fallback(self.failure.insert(snapshot))
            }
        }
    }

    /// Start over with a fresh, healthy boundary of the same name.
    pub fn remount(self) -> Self {
        Self::new(self.name, self.reporter)
    }

    fn capture(&self, err: RenderError, kind: FailureKind) -> ErrorSnapshot {
        let info = ErrorInfo {
            boundary: self.name.clone(),
            kind,
            occurred_at: Utc::now(),
        };
        self.reporter
            .error("Render failed, showing fallback", &err, &info);
        ErrorSnapshot { error: err, info }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;

    #[derive(Default)]
    struct RecordingReporter {
        calls: RefCell<Vec<(String, RenderError)>>,
    }

    impl ErrorReporter for &RecordingReporter {
        fn error(&self, message: &str, error: &RenderError, _context: &ErrorInfo) {
            self.calls
                .borrow_mut()
                .push((message.to_string(), error.clone()));
        }
    }

    #[test]
    fn test_healthy_boundary_renders_children() {
        let reporter = RecordingReporter::default();
        let mut boundary = ErrorBoundary::new("page", &reporter);

        match boundary.render(|| Ok::<_, RenderError>(42)) {
            Rendered::Children(v) => assert_eq!(v, 42),
            Rendered::Fallback(_) => panic!("expected children"),
        }
        assert!(!boundary.is_failed());
        assert!(reporter.calls.borrow().is_empty());
    }

    #[test]
    fn test_error_transitions_to_failed_once() {
        let reporter = RecordingReporter::default();
        let mut boundary = ErrorBoundary::new("page", &reporter);

        let first = boundary.render(|| Err::<(), _>(RenderError::msg("bad index")));
        assert!(first.is_fallback());

        let second = boundary.render(|| Err::<(), _>(RenderError::msg("again")));
        assert!(second.is_fallback());

        assert_eq!(reporter.calls.borrow().len(), 1);
        let snapshot = boundary.snapshot().unwrap();
        assert_eq!(snapshot.error, RenderError::msg("bad index"));
        assert_eq!(snapshot.info.kind, FailureKind::Error);
        assert_eq!(snapshot.info.boundary, "page");
    }

    #[test]
    fn test_failed_boundary_never_renders_children_again() {
        let reporter = RecordingReporter::default();
        let mut boundary = ErrorBoundary::new("page", &reporter);
        let calls = Cell::new(0);

        let _ = boundary.render(|| {
            calls.set(calls.get() + 1);
            Err::<(), _>(RenderError::msg("boom"))
        });
        let _ = boundary.render(|| {
            calls.set(calls.get() + 1);
            Ok::<_, RenderError>(())
        });

        assert_eq!(calls.get(), 1);
        assert!(boundary.is_failed());
    }

    #[test]
    fn test_panics_are_contained() {
        let reporter = RecordingReporter::default();
        let mut boundary = ErrorBoundary::new("results", &reporter);

        let rendered = boundary.render(|| -> Result<(), RenderError> { panic!("index out of range") });
        match rendered {
            Rendered::Fallback(snapshot) => {
                assert_eq!(snapshot.info.kind, FailureKind::Panic);
                assert_eq!(
                    snapshot.error,
                    RenderError::Panicked("index out of range".to_string())
                );
            }
            Rendered::Children(_) => panic!("expected fallback"),
        }

        let again = boundary.render(|| -> Result<(), RenderError> { panic!("second") });
        assert!(again.is_fallback());
        assert_eq!(reporter.calls.borrow().len(), 1);
    }

    #[test]
    fn test_remount_restores_healthy() {
        let reporter = RecordingReporter::default();
        let mut boundary = ErrorBoundary::new("page", &reporter);
        let _ = boundary.render(|| Err::<(), _>(RenderError::msg("boom")));
        assert!(boundary.is_failed());

        let mut boundary = boundary.remount();
        assert_eq!(boundary.state(), BoundaryState::Healthy);
        assert!(!boundary.render(|| Ok::<_, RenderError>(())).is_fallback());
    }

    #[test]
    fn test_anyhow_errors_convert() {
        let err: RenderError = anyhow::anyhow!("outer").context("while drawing").into();
        assert_eq!(err, RenderError::msg("while drawing: outer"));
    }
}

//! Build-time and run-time error types.
//!
//! Structural mistakes (refining something that cannot be refined here, a builder closure bailing out) are
//! [`SpecError`]s and surface while the tree is being built. Failures of an example are [`ExampleFailure`]s and
//! surface from [`Leaf::try_run`](crate::node::Leaf::try_run) after cleanup has finished.

use std::any::Any;
use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

/// Result type for specification building.
pub type SpecResult<T> = Result<T, SpecError>;

/// Invalid usage detected while building a specification tree.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum SpecError {
    /// The handle passed to `refine` does not belong to the specification being built.
    #[error("Only support and subject collaborators can be refined, not {handle}")]
    #[diagnostic(
        code(spekt::refine::foreign_collaborator),
        help("refine a handle returned by `support` or `subject` in this specification")
    )]
    ForeignCollaborator { handle: String },

    /// The collaborator was declared in a context that does not enclose the refining context.
    #[error("{handle} is declared in `{declared_in}` and cannot be refined from `{context}`")]
    #[diagnostic(
        code(spekt::refine::out_of_scope),
        help("refine a collaborator from the context that declares it, or from a context nested inside it")
    )]
    OutOfScope {
        handle: String,
        declared_in: String,
        context: String,
    },

    /// A builder closure returned an error of its own.
    #[error("building `{context}` failed: {message}")]
    #[diagnostic(code(spekt::build::failed))]
    Build { context: String, message: String },
}

impl SpecError {
    /// Create a [`SpecError::Build`] for the named context.
    pub fn build(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Build {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Whether this error rejects an argument passed to a DSL operation (as opposed to a failed builder).
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::ForeignCollaborator { .. } | Self::OutOfScope { .. })
    }
}

/// A caught panic, kept so it can be re-raised unchanged.
pub struct PanicPayload(Box<dyn Any + Send>);

impl PanicPayload {
    pub(crate) fn new(payload: Box<dyn Any + Send>) -> Self {
        Self(payload)
    }

    /// Best-effort textual form of the panic (`&str` and `String` payloads are recognised).
    pub fn message(&self) -> &str {
        panic_message(self.0.as_ref())
    }

    /// Give back the original payload, e.g. for [`std::panic::resume_unwind`].
    pub fn into_inner(self) -> Box<dyn Any + Send> {
        self.0
    }
}

impl fmt::Debug for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PanicPayload").field(&self.message()).finish()
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}

/// A destructor (or a value's `Drop`) that panicked while an example was being cleaned up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cleanup of {collaborator} panicked: {message}")]
pub struct CleanupFailure {
    pub collaborator: String,
    pub message: String,
}

/// Why an example run failed.
#[derive(Debug, Error)]
pub enum ExampleFailure {
    /// The body (or a collaborator it resolved) panicked. Cleanup still ran; its failures are kept alongside.
    #[error("example `{example}` failed: {body}{}", cleanup_suffix(.cleanup))]
    Body {
        example: String,
        body: PanicPayload,
        cleanup: Vec<CleanupFailure>,
    },

    /// The body passed but at least one collaborator failed to clean up.
    #[error("cleanup after example `{example}` failed: {}", join_cleanup(.cleanup))]
    Cleanup {
        example: String,
        cleanup: Vec<CleanupFailure>,
    },
}

impl ExampleFailure {
    /// Cleanup failures recorded during the run, whatever happened to the body.
    pub fn cleanup_failures(&self) -> &[CleanupFailure] {
        match self {
            Self::Body { cleanup, .. } | Self::Cleanup { cleanup, .. } => cleanup,
        }
    }

    /// The body's panic, if the body is what failed.
    pub fn body_failure(&self) -> Option<&PanicPayload> {
        match self {
            Self::Body { body, .. } => Some(body),
            Self::Cleanup { .. } => None,
        }
    }
}

fn join_cleanup(cleanup: &[CleanupFailure]) -> String {
    cleanup.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

fn cleanup_suffix(cleanup: &[CleanupFailure]) -> String {
    if cleanup.is_empty() {
        String::new()
    } else {
        format!(" (and {})", join_cleanup(cleanup))
    }
}

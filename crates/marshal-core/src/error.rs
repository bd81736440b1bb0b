#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct GovernorError(#[from] GovernorErrorKind);

impl GovernorError {
    pub fn invalid_task_spec(model_class: impl Into<String>) -> Self {
        Self(GovernorErrorKind::InvalidTaskSpec {
            model_class: model_class.into(),
        })
    }

    pub fn duplicate_class(model_class: impl Into<String>) -> Self {
        Self(GovernorErrorKind::DuplicateClass {
            model_class: model_class.into(),
        })
    }

    pub fn already_started() -> Self {
        Self(GovernorErrorKind::AlreadyStarted)
    }

    /// True for the admission error a caller should turn into "503".
    pub fn is_invalid_task_spec(&self) -> bool {
        matches!(self.0, GovernorErrorKind::InvalidTaskSpec { .. })
    }
}

#[derive(Debug, thiserror::Error)]
enum GovernorErrorKind {
    #[error("model class `{model_class}` is not in the accepted whitelist")]
    InvalidTaskSpec { model_class: String },
    #[error("a class named `{model_class}` is already registered")]
    DuplicateClass { model_class: String },
    #[error("the governor loop has already been started")]
    AlreadyStarted,
}

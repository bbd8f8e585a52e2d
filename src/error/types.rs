use thiserror::Error;

/// Unified result type for the MVVM framework.
pub type Result<T> = std::result::Result<T, MvvmError>;

/// Errors surfaced by repositories, views and the window subsystem.
///
/// Absent lookups and headless no-ops are not errors; they come back as
/// `Ok(None)` or `false`. Every variant here is a wiring mistake or an
/// internal fault that callers are expected to propagate.
#[derive(Debug, Error)]
pub enum MvvmError {
    #[error("view `{view}` has no view model class configured")]
    MissingViewModelClass { view: &'static str },
    #[error("view model `{view_model}` is already bound to a view")]
    ViewModelAlreadyBound { view_model: &'static str },
    #[error("`{model}` requires a session model repository but none is reachable")]
    SessionRepositoryUnavailable { model: &'static str },
    #[error("{repository} is tearing down; refusing to create `{class}`")]
    RepositoryClosing {
        repository: &'static str,
        class: &'static str,
    },
    #[error("class `{0}` is abstract and cannot be instantiated")]
    AbstractClass(&'static str),
    #[error("registry entry for `{0}` has an unexpected type")]
    TypeMismatch(&'static str),
    #[error("registry lock poisoned")]
    Poisoned,
}

use crate::{handler::Shape, Category, Owner};

/// Result alias that carries the custom [`BiasError`] type.
pub type Result<T> = std::result::Result<T, BiasError>;

/// Return type of every registered handler. An `Err` is reported by the
/// dispatch engine and treated as "nothing happened".
pub type HandlerResult<T> = Result<T>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum BiasError {
    /// Registration named a handler the registry does not know for that owner.
    #[error("no handler named `{name}` is registered for {owner}")]
    UnknownHandler { owner: Owner, name: String },
    /// The handler exists but has the wrong call shape for the slot it was
    /// bound to (an action where a stage was expected or vice versa).
    #[error("handler `{name}` is {found}, expected {expected}")]
    ShapeMismatch {
        name: String,
        expected: Shape,
        found: Shape,
    },
    /// The handler's declared event category does not fit.
    #[error("handler `{name}` takes {found} events, {expected} required")]
    CategoryMismatch {
        name: String,
        expected: Category,
        found: Category,
    },
    #[error("`{0}` is not a stage name, it should be one of: {names}", names = crate::stage::Stage::NAMES.join(", "))]
    UnknownStage(String),
    #[error("timer period must be positive, got {0} ms")]
    InvalidPeriod(i64),
    /// Free-form failure, mostly raised by application handlers.
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl BiasError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for BiasError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for BiasError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

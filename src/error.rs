//! Error types for the engine boundary.
//!
//! Host-side misuse (`Argument`, `Type`) is kept apart from failures raised by
//! the script itself (`Script`), so a caller can tell "I called this wrong"
//! from "the script failed".

use std::fmt;

use crate::weak_values::WeakValuesId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Wrong arity or argument kind at the script boundary.
    #[error("{0}")]
    Argument(String),

    /// Operation applied to a value of the wrong type.
    #[error("{0}")]
    Type(String),

    /// Compile-time or run-time exception raised by script code.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// A native callback fired after its engine was destroyed.
    #[error("JsEngine is gone")]
    EngineGone,

    /// Token issued by another engine. The token is handed back so the
    /// values can still be taken from the engine that parked them.
    #[error("weak values token belongs to another engine")]
    ForeignToken(WeakValuesId),

    /// Token whose group is no longer parked.
    #[error("unknown weak values token")]
    UnknownToken,

    /// The isolate provider could not create an isolate.
    #[error("isolate creation failed: {0}")]
    Isolate(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An exception captured from a `v8::TryCatch`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptError {
    pub message: String,
    pub stack: Option<String>,
    /// `resource:line` of the throwing statement, when V8 reports one.
    pub location: Option<String>,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // V8 stacks already start with the message line
        if let Some(stack) = &self.stack
            && stack.starts_with(&self.message)
        {
            return f.write_str(stack);
        }

        f.write_str(&self.message)?;

        if let Some(location) = &self.location {
            write!(f, " ({})", location)?;
        }

        if let Some(stack) = &self.stack {
            write!(f, "\n{}", stack)?;
        }

        Ok(())
    }
}

impl std::error::Error for ScriptError {}

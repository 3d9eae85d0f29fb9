use tagkit_attrs::AttrError;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the tag protocol itself
#[derive(Debug, Error)]
pub enum TagError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The render context cannot escape or mark output as safe
    #[error("Misconfigured render context: {0}")]
    Misconfigured(String),
    /// Rendering the body of a block tag failed
    #[error("{0}")]
    Body(BoxError),
}

impl From<AttrError> for TagError {
    fn from(error: AttrError) -> Self {
        match error {
            AttrError::InvalidArgument(message) => TagError::InvalidArgument(message),
        }
    }
}

/// Errors raised while compiling or rendering a template
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("Unknown tag '{name}' at line {line}, column {column}")]
    UnknownTag {
        name: String,
        line: usize,
        column: usize,
    },
    #[error("Unexpected '{name}' at line {line}, column {column}")]
    UnexpectedEndTag {
        name: String,
        line: usize,
        column: usize,
    },
    #[error("Missing '{0}'")]
    MissingEndTag(String),
    #[error("Variable '{0}' is undefined")]
    UndefinedVariable(String),
    #[error("Unknown filter '{0}'")]
    UnknownFilter(String),
    #[error("Filter '{name}' failed: {message}")]
    Filter { name: String, message: String },
    #[error(transparent)]
    Tag(#[from] TagError),
}

impl From<AttrError> for TemplateError {
    fn from(error: AttrError) -> Self {
        TemplateError::Tag(TagError::from(error))
    }
}

use thiserror::Error;

use crate::value::Value;

#[derive(Debug, Error, PartialEq)]
pub enum AttrError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl AttrError {
    pub fn not_a_sequence(value: &Value) -> Self {
        AttrError::InvalidArgument(format!(
            "attributes must be a sequence, got {}",
            value.kind_name()
        ))
    }
}

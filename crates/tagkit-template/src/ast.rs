//! # Abstract Syntax Tree (AST) for tag arguments
//!
//! This module defines the structures that the tag parser produces for the
//! argument list of a tag invocation, e.g. the `class=["a", b] "checked"` part of
//! `{% custom class=["a", b] "checked" %}`.
//!
//! ## Core types
//!
//! - **`TagAttr`**: A single argument - `key=value` or a positional `value`
//! - **`TagValue`**: A value with its kind, children and filters - `items|first`
//! - **`TagToken`**: A piece of source text with position information
//! - **`TagValueFilter`**: A filter applied to a value - `|join(", ")`
//! - **`ValueKind`**: Enum of supported value types
//!
//! Positions are relative to the parsed argument string, not to the template.
//!
//! ## Example
//!
//! ```rust
//! use tagkit_template::ast::*;
//!
//! // class=clz
//! let attr = TagAttr {
//!     key: Some(TagToken {
//!         token: "class".to_string(),
//!         start_index: 0,
//!         end_index: 5,
//!         line_col: (1, 1),
//!     }),
//!     value: TagValue {
//!         token: TagToken {
//!             token: "clz".to_string(),
//!             start_index: 6,
//!             end_index: 9,
//!             line_col: (1, 7),
//!         },
//!         children: vec![],
//!         filters: vec![],
//!         kind: ValueKind::Variable,
//!         start_index: 6,
//!         end_index: 9,
//!         line_col: (1, 7),
//!     },
//!     start_index: 0,
//!     end_index: 9,
//!     line_col: (1, 1),
//! };
//! assert!(attr.is_keyword());
//! ```

/// Top-level tag argument, e.g. `key=my_var` or without key like `my_var|filter`
#[derive(Debug, PartialEq, Clone)]
pub struct TagAttr {
    pub key: Option<TagToken>,
    pub value: TagValue,

    /// Start index (incl. key)
    pub start_index: usize,
    /// End index (incl. filters)
    pub end_index: usize,
    /// Line and column (incl. key)
    pub line_col: (usize, usize),
}

impl TagAttr {
    pub fn is_keyword(&self) -> bool {
        self.key.is_some()
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ValueKind {
    List,
    Dict,
    Int,
    Float,
    Bool,
    Null,
    Variable,
    /// Token holds the decoded string, without quotes
    String,
    /// `a + b + ...`, operands are the children
    Sum,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::List => "list",
            ValueKind::Dict => "dict",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
            ValueKind::Null => "null",
            ValueKind::Variable => "variable",
            ValueKind::String => "string",
            ValueKind::Sum => "sum",
        }
    }
}

/// Metadata of the matched token
#[derive(Debug, PartialEq, Clone)]
pub struct TagToken {
    /// String value of the token (excl. filters)
    pub token: String,
    /// Start index (excl. filters)
    pub start_index: usize,
    /// End index (excl. filters)
    pub end_index: usize,
    /// Line and column (excl. filters)
    pub line_col: (usize, usize),
}

#[derive(Debug, PartialEq, Clone)]
pub struct TagValue {
    /// Position and string value of the value (excl. filters)
    pub token: TagToken,
    /// List items, dict key-value entries (key, value, key, value, ...) or sum operands
    pub children: Vec<TagValue>,
    pub kind: ValueKind,
    pub filters: Vec<TagValueFilter>,

    /// Start index (incl. filters)
    pub start_index: usize,
    /// End index (incl. filters)
    pub end_index: usize,
    /// Line and column (incl. filters)
    pub line_col: (usize, usize),
}

#[derive(Debug, PartialEq, Clone)]
pub struct TagValueFilter {
    /// Token of the filter, e.g. `join`
    pub token: TagToken,
    /// Arguments of the filter, e.g. `", "` in `join(", ")`
    pub args: Vec<TagValue>,

    /// Start index (incl. `|`)
    pub start_index: usize,
    /// End index (incl. arguments)
    pub end_index: usize,
    /// Line and column (incl. `|`)
    pub line_col: (usize, usize),
}

//! # Tag Argument Evaluator
//!
//! This module evaluates the parsed arguments of a tag invocation (see [`crate::ast`])
//! against the variables of the current render, producing the [`Value`]s that are
//! handed to [`crate::tag::Tag::invoke`].
//!
//! ## Argument layout
//!
//! Positional arguments keep their order. All keyword arguments are collected into
//! a single map that is appended after the positional ones, and that map carries
//! the reserved `__keywords` marker:
//!
//! ```text
//! {% custom a=1 "checked" b=x %}  =>  ["checked", {a: 1, b: <x>, __keywords: true}]
//! ```
//!
//! A keyword given twice keeps its first position and its last value.
//!
//! ## Values
//!
//! - **Variables**: dotted paths looked up in the locals, undefined is `null`
//!   unless the environment is configured to fail
//! - **Sums**: numbers are added, anything else is concatenated as text
//! - **Filters**: applied left to right, looked up in the environment

use indexmap::IndexMap;
use tagkit_attrs::{Escaper, Value, RESERVED_KEY};

use crate::ast::{TagAttr, TagValue, ValueKind};
use crate::environment::Environment;
use crate::error::TemplateError;

/// Everything an expression can see while being evaluated
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    pub env: &'a Environment,
    pub locals: &'a Value,
    pub escaper: &'a dyn Escaper,
}

pub fn evaluate_attributes(
    attributes: &[TagAttr],
    scope: &Scope<'_>,
) -> Result<Vec<Value>, TemplateError> {
    let mut args = Vec::with_capacity(attributes.len());
    let mut kwargs = IndexMap::new();

    for attr in attributes {
        let value = evaluate_value(&attr.value, scope)?;
        match &attr.key {
            Some(key) => {
                kwargs.insert(key.token.clone(), value);
            }
            None => args.push(value),
        }
    }

    if !kwargs.is_empty() {
        kwargs.insert(RESERVED_KEY.to_string(), Value::Bool(true));
        args.push(Value::Map(kwargs));
    }

    Ok(args)
}

pub fn evaluate_value(value: &TagValue, scope: &Scope<'_>) -> Result<Value, TemplateError> {
    let text = &value.token.token;
    let mut result = match value.kind {
        ValueKind::Int => match text.parse::<i64>() {
            Ok(i) => Value::Int(i),
            // Too large for an integer
            Err(_) => Value::Float(parse_float(text)?),
        },
        ValueKind::Float => Value::Float(parse_float(text)?),
        ValueKind::Bool => Value::Bool(text.eq_ignore_ascii_case("true")),
        ValueKind::Null => Value::Null,
        ValueKind::String => Value::Str(text.clone()),
        ValueKind::Variable => lookup_variable(text, scope)?,
        ValueKind::List => Value::List(
            value
                .children
                .iter()
                .map(|item| evaluate_value(item, scope))
                .collect::<Result<_, _>>()?,
        ),
        ValueKind::Dict => {
            let mut map = IndexMap::new();
            for pair in value.children.chunks(2) {
                match pair {
                    [key, item] => {
                        map.insert(key.token.token.clone(), evaluate_value(item, scope)?);
                    }
                    _ => {
                        return Err(TemplateError::Syntax {
                            line: value.line_col.0,
                            column: value.line_col.1,
                            message: "Dict AST has uneven number of key-value children"
                                .to_string(),
                        })
                    }
                }
            }
            Value::Map(map)
        }
        ValueKind::Sum => {
            let mut operands = value.children.iter();
            let first = match operands.next() {
                Some(first) => evaluate_value(first, scope)?,
                None => Value::Null,
            };
            operands.try_fold(first, |acc, operand| {
                Ok::<_, TemplateError>(add(acc, evaluate_value(operand, scope)?))
            })?
        }
    };

    // Apply filters
    for filter in &value.filters {
        let args = filter
            .args
            .iter()
            .map(|arg| evaluate_value(arg, scope))
            .collect::<Result<Vec<_>, _>>()?;
        result = scope
            .env
            .apply_filter(&filter.token.token, result, &args, scope.escaper)?;
    }

    Ok(result)
}

fn parse_float(text: &str) -> Result<f64, TemplateError> {
    text.parse::<f64>().map_err(|e| TemplateError::Syntax {
        line: 1,
        column: 1,
        message: format!("Invalid number '{}': {}", text, e),
    })
}

fn lookup_variable(path: &str, scope: &Scope<'_>) -> Result<Value, TemplateError> {
    let mut current = scope.locals;
    for part in path.split('.') {
        match current.get(part) {
            Some(next) => current = next,
            None if scope.env.config().throw_on_undefined => {
                return Err(TemplateError::UndefinedVariable(path.to_string()))
            }
            None => return Ok(Value::Null),
        }
    }
    Ok(current.clone())
}

// `+` adds numbers and concatenates everything else. Concatenation drops safeness.
fn add(left: Value, right: Value) -> Value {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => match a.checked_add(b) {
            Some(sum) => Value::Int(sum),
            None => Value::Float(a as f64 + b as f64),
        },
        (Value::Int(a), Value::Float(b)) => Value::Float(a as f64 + b),
        (Value::Float(a), Value::Int(b)) => Value::Float(a + b as f64),
        (Value::Float(a), Value::Float(b)) => Value::Float(a + b),
        (left, right) => Value::Str(format!("{}{}", left, right)),
    }
}

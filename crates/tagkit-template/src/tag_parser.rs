//! # Tag Argument Parser
//!
//! This module converts the argument list of a tag invocation (e.g. the
//! `class=["a", b] "checked"` in `{% custom class=["a", b] "checked" %}`) into an
//! Abstract Syntax Tree (AST) using [Pest](https://pest.rs/) parsing library.
//!
//! The parsing grammar is defined in `grammar.pest` and supports:
//!
//! ## Features
//!
//! - **Keyword and positional arguments**: `key=value`, `"data-key"=value`, `value`
//! - **Value types**: strings, numbers, booleans, null, variables, lists, dicts
//! - **Concatenation**: `prefix + name` (numeric addition for numbers)
//! - **Grouping**: `("<b>"|safe)`
//! - **Filter chains**: `value|filter1|filter2(arg)`
//! - **Optional commas** between arguments
//! - **Position tracking**: line/column information for error reporting
//!
//! ## Error Handling
//!
//! The parser returns `ParseError` for invalid input, which includes:
//! - Pest parsing errors (syntax violations, e.g. `<script>="x"` or `data-src-="x"`)
//! - Invalid key errors (for malformed attributes)

use crate::ast::{TagAttr, TagToken, TagValue, TagValueFilter, ValueKind};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "grammar.pest"]
pub struct TagParser;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Pest parser error: {0}")]
    PestError(#[from] pest::error::Error<Rule>),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl ParseError {
    /// Offset into the parsed input where the error was detected
    pub fn position(&self) -> Option<usize> {
        match self {
            ParseError::PestError(error) => match error.location {
                pest::error::InputLocation::Pos(pos) => Some(pos),
                pest::error::InputLocation::Span((start, _)) => Some(start),
            },
            ParseError::InvalidKey(_) => None,
        }
    }

    /// Message without the pest source excerpt
    pub fn message(&self) -> String {
        match self {
            ParseError::PestError(error) => error.variant.message().into_owned(),
            ParseError::InvalidKey(message) => format!("Invalid key: {}", message),
        }
    }
}

impl TagParser {
    /// Parse the argument list of a tag, e.g. `a=1 b=[x, y] "flag"`
    pub fn parse_signature(input: &str) -> Result<Vec<TagAttr>, ParseError> {
        let signature_pair = Self::parse(Rule::signature, input)?
            .next()
            .ok_or_else(|| ParseError::InvalidKey("Empty signature".to_string()))?;

        let mut attributes = Vec::new();
        for pair in signature_pair.into_inner() {
            match pair.as_rule() {
                Rule::attribute => attributes.push(Self::process_attribute(pair)?),
                Rule::EOI => {}
                other => unreachable!("Invalid signature item {:?}", other),
            }
        }
        Ok(attributes)
    }

    /// Parse a single expression, e.g. the content of `{{ title|upper }}`
    pub fn parse_expression(input: &str) -> Result<TagValue, ParseError> {
        let output_pair = Self::parse(Rule::output, input)?
            .next()
            .ok_or_else(|| ParseError::InvalidKey("Empty expression".to_string()))?;

        let expression = output_pair
            .into_inner()
            .find(|p| p.as_rule() == Rule::expression)
            .ok_or_else(|| ParseError::InvalidKey("Empty expression".to_string()))?;

        Self::process_expression(expression)
    }

    fn process_attribute(attr_pair: Pair<Rule>) -> Result<TagAttr, ParseError> {
        let (start_index, end_index) = Self::trimmed_span(&attr_pair);
        let line_col = attr_pair.line_col();

        let mut inner_pairs = attr_pair.into_inner().peekable();

        // Check if this is a key-value pair or just a value
        let key = match inner_pairs.peek().map(|p| p.as_rule()) {
            Some(Rule::key) => {
                let key_pair = inner_pairs.next().unwrap();
                Some(Self::process_key(key_pair)?)
            }
            _ => None,
        };

        let value_pair = inner_pairs
            .find(|p| p.as_rule() == Rule::expression)
            .ok_or_else(|| {
                ParseError::InvalidKey(format!(
                    "Missing value for key: {}",
                    key.as_ref().map_or("", |k| k.token.as_str())
                ))
            })?;
        let value = Self::process_expression(value_pair)?;

        Ok(TagAttr {
            key,
            value,
            start_index,
            end_index,
            line_col,
        })
    }

    fn process_key(key_pair: Pair<Rule>) -> Result<TagToken, ParseError> {
        let span = key_pair.as_span();
        let line_col = key_pair.line_col();
        let inner = key_pair
            .into_inner()
            .next()
            .ok_or_else(|| ParseError::InvalidKey("Empty key".to_string()))?;

        let token = match inner.as_rule() {
            Rule::attr_name => inner.as_str().to_string(),
            Rule::string_literal => Self::process_string(inner),
            other => {
                return Err(ParseError::InvalidKey(format!(
                    "Expected name or string, got {:?}",
                    other
                )))
            }
        };

        if token.is_empty() {
            return Err(ParseError::InvalidKey("Key must not be empty".to_string()));
        }

        Ok(TagToken {
            token,
            start_index: span.start(),
            end_index: span.end(),
            line_col,
        })
    }

    // Expression is one or more operands joined with `+`. A single operand is
    // returned as-is, so `my_var` is a Variable and not a Sum of one.
    fn process_expression(expression_pair: Pair<Rule>) -> Result<TagValue, ParseError> {
        let (start_index, end_index) = Self::trimmed_span(&expression_pair);
        let token = Self::token_of(&expression_pair);
        let line_col = expression_pair.line_col();

        let mut operands = expression_pair
            .into_inner()
            .map(Self::process_operand)
            .collect::<Result<Vec<_>, _>>()?;

        if operands.len() == 1 {
            return Ok(operands.remove(0));
        }

        Ok(TagValue {
            token,
            children: operands,
            kind: ValueKind::Sum,
            filters: vec![],
            start_index,
            end_index,
            line_col,
        })
    }

    // Operand means that:
    // 1. It is a "primary" value - literal, variable, list, dict or a group
    // 2. It may have a filter chain after it
    //
    // E.g. `my_var`, `my_var|filter`, `[1, 2, 3]|first|upper` are all operands
    fn process_operand(operand_pair: Pair<Rule>) -> Result<TagValue, ParseError> {
        let (total_start_index, total_end_index) = Self::trimmed_span(&operand_pair);
        let total_line_col = operand_pair.line_col();

        let mut inner_pairs = operand_pair.into_inner();
        let value_part = inner_pairs
            .next()
            .ok_or_else(|| ParseError::InvalidKey("Empty value".to_string()))?;

        let mut value = match value_part.as_rule() {
            // A group is transparent: `(a|f)|g` is `a` with filters `f` and `g`
            Rule::group => {
                let expression = value_part
                    .into_inner()
                    .next()
                    .ok_or_else(|| ParseError::InvalidKey("Empty group".to_string()))?;
                Self::process_expression(expression)?
            }
            _ => Self::process_primary(value_part)?,
        };

        if let Some(filter_chain) = inner_pairs.next() {
            value.filters.extend(Self::process_filters(filter_chain)?);
        }

        value.start_index = total_start_index;
        value.end_index = total_end_index;
        value.line_col = total_line_col;
        Ok(value)
    }

    fn process_primary(value_pair: Pair<Rule>) -> Result<TagValue, ParseError> {
        let span = value_pair.as_span();
        let line_col = value_pair.line_col();
        let mut token = Self::token_of(&value_pair);

        let (kind, children) = match value_pair.as_rule() {
            Rule::list => (ValueKind::List, Self::process_list(value_pair)?),
            Rule::dict => (ValueKind::Dict, Self::process_dict(value_pair)?),
            Rule::int => (ValueKind::Int, vec![]),
            Rule::float => (ValueKind::Float, vec![]),
            Rule::boolean => (ValueKind::Bool, vec![]),
            Rule::null => (ValueKind::Null, vec![]),
            Rule::variable => (ValueKind::Variable, vec![]),
            Rule::string_literal => {
                token.token = Self::process_string(value_pair);
                (ValueKind::String, vec![])
            }
            other => {
                return Err(ParseError::InvalidKey(format!(
                    "Expected value, got {:?}",
                    other
                )))
            }
        };

        Ok(TagValue {
            token,
            children,
            kind,
            filters: vec![],
            start_index: span.start(),
            end_index: span.end(),
            line_col,
        })
    }

    fn process_list(list_pair: Pair<Rule>) -> Result<Vec<TagValue>, ParseError> {
        list_pair
            .into_inner()
            .filter(|p| p.as_rule() == Rule::expression)
            .map(Self::process_expression)
            .collect()
    }

    // Dict children are flattened as key, value, key, value, ...
    fn process_dict(dict_pair: Pair<Rule>) -> Result<Vec<TagValue>, ParseError> {
        let mut items = Vec::new();
        for item in dict_pair.into_inner() {
            if item.as_rule() != Rule::dict_item {
                continue;
            }

            let mut inner = item.into_inner();
            let (key_pair, value_pair) = match (inner.next(), inner.next()) {
                (Some(key_pair), Some(value_pair)) => (key_pair, value_pair),
                _ => {
                    return Err(ParseError::InvalidKey(
                        "Dictionary item must have a key and a value".to_string(),
                    ))
                }
            };

            let key_span = key_pair.as_span();
            let key_line_col = key_pair.line_col();
            let key_inner = key_pair
                .into_inner()
                .next()
                .ok_or_else(|| ParseError::InvalidKey("Empty dictionary key".to_string()))?;
            let key_text = match key_inner.as_rule() {
                Rule::string_literal => Self::process_string(key_inner),
                _ => key_inner.as_str().to_string(),
            };

            items.push(TagValue {
                token: TagToken {
                    token: key_text,
                    start_index: key_span.start(),
                    end_index: key_span.end(),
                    line_col: key_line_col,
                },
                children: vec![],
                kind: ValueKind::String,
                filters: vec![],
                start_index: key_span.start(),
                end_index: key_span.end(),
                line_col: key_line_col,
            });
            items.push(Self::process_expression(value_pair)?);
        }
        Ok(items)
    }

    fn process_filters(filter_chain: Pair<Rule>) -> Result<Vec<TagValueFilter>, ParseError> {
        // Return error if not a filter chain rule
        if filter_chain.as_rule() != Rule::filter_chain {
            return Err(ParseError::InvalidKey(format!(
                "Expected filter chain, got {:?}",
                filter_chain.as_rule()
            )));
        }

        let mut filters = Vec::new();
        for filter in filter_chain.into_inner() {
            let filter_span = filter.as_span();
            let filter_start_index = filter_span.start();
            let filter_end_index = filter_span.end();
            let filter_line_col = filter.line_col();

            let mut filter_name = None;
            let mut args = Vec::new();
            for part in filter.into_inner() {
                match part.as_rule() {
                    Rule::filter_name => filter_name = Some(Self::token_of(&part)),
                    Rule::filter_args => {
                        for arg in part.into_inner() {
                            args.push(Self::process_expression(arg)?);
                        }
                    }
                    other => unreachable!("Invalid filter part {:?}", other),
                }
            }

            let token = filter_name
                .ok_or_else(|| ParseError::InvalidKey("Filter without a name".to_string()))?;

            filters.push(TagValueFilter {
                token,
                args,
                start_index: filter_start_index,
                end_index: filter_end_index,
                line_col: filter_line_col,
            });
        }

        Ok(filters)
    }

    // Decode the content of a quoted string, resolving backslash escapes
    fn process_string(string_pair: Pair<Rule>) -> String {
        let raw = string_pair
            .into_inner()
            .next()
            .map(|inner| inner.as_str())
            .unwrap_or("");

        let mut decoded = String::with_capacity(raw.len());
        let mut chars = raw.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                decoded.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => decoded.push('\n'),
                Some('t') => decoded.push('\t'),
                Some('r') => decoded.push('\r'),
                Some(other) => decoded.push(other),
                None => decoded.push('\\'),
            }
        }
        decoded
    }

    // Implicit whitespace before an optional tail is part of the pest span,
    // so spans and tokens are trimmed on the right.
    fn trimmed_span(pair: &Pair<Rule>) -> (usize, usize) {
        let start = pair.as_span().start();
        (start, start + pair.as_str().trim_end().len())
    }

    fn token_of(pair: &Pair<Rule>) -> TagToken {
        let (start_index, end_index) = Self::trimmed_span(pair);
        TagToken {
            token: pair.as_str().trim_end().to_string(),
            start_index,
            end_index,
            line_col: pair.line_col(),
        }
    }
}

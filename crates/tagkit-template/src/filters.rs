//! Built-in filters, applied with `value|name(args)`.

use std::sync::Arc;

use tagkit_attrs::{Escaper, Value};

use crate::error::TemplateError;

/// `(input, args, escaper) -> output`
pub type Filter =
    Arc<dyn Fn(Value, &[Value], &dyn Escaper) -> Result<Value, TemplateError> + Send + Sync>;

pub(crate) fn builtin_filters() -> Vec<(&'static str, Filter)> {
    vec![
        ("safe", Arc::new(safe) as Filter),
        ("escape", Arc::new(escape) as Filter),
        ("e", Arc::new(escape) as Filter),
        ("upper", Arc::new(upper) as Filter),
        ("lower", Arc::new(lower) as Filter),
        ("first", Arc::new(first) as Filter),
        ("join", Arc::new(join) as Filter),
        ("default", Arc::new(default) as Filter),
    ]
}

fn safe(value: Value, _args: &[Value], escaper: &dyn Escaper) -> Result<Value, TemplateError> {
    Ok(match value {
        Value::Safe(_) => value,
        other => Value::Safe(escaper.mark_safe(other.to_string())),
    })
}

fn escape(value: Value, _args: &[Value], escaper: &dyn Escaper) -> Result<Value, TemplateError> {
    Ok(match value {
        Value::Safe(_) => value,
        other => Value::Safe(escaper.mark_safe(escaper.escape(&other.to_string()))),
    })
}

fn upper(value: Value, _args: &[Value], _escaper: &dyn Escaper) -> Result<Value, TemplateError> {
    Ok(map_text(value, |s| s.to_uppercase()))
}

fn lower(value: Value, _args: &[Value], _escaper: &dyn Escaper) -> Result<Value, TemplateError> {
    Ok(map_text(value, |s| s.to_lowercase()))
}

fn first(value: Value, _args: &[Value], _escaper: &dyn Escaper) -> Result<Value, TemplateError> {
    Ok(match value {
        Value::List(items) => items.into_iter().next().unwrap_or_default(),
        Value::Str(_) | Value::Safe(_) => map_text(value, |s| s.chars().take(1).collect()),
        other => other,
    })
}

fn join(value: Value, args: &[Value], _escaper: &dyn Escaper) -> Result<Value, TemplateError> {
    let separator = args.first().map(Value::to_string).unwrap_or_default();
    Ok(match value {
        Value::List(items) => Value::Str(
            items
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(&separator),
        ),
        other => Value::Str(other.to_string()),
    })
}

/// `default(fallback)` replaces null, `default(fallback, true)` replaces any falsy value
fn default(value: Value, args: &[Value], _escaper: &dyn Escaper) -> Result<Value, TemplateError> {
    let fallback = args.first().ok_or_else(|| TemplateError::Filter {
        name: "default".to_string(),
        message: "expected a fallback value".to_string(),
    })?;
    let falsy = args.get(1).map_or(false, Value::is_truthy);

    let replace = if falsy {
        !value.is_truthy()
    } else {
        value.is_null()
    };
    Ok(if replace { fallback.clone() } else { value })
}

// Text transforms keep safeness. Non-text values are stringified first.
fn map_text(value: Value, f: impl FnOnce(&str) -> String) -> Value {
    match value {
        Value::Safe(html) => Value::safe(f(html.as_str())),
        Value::Str(text) => Value::Str(f(&text)),
        other => Value::Str(f(&other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagkit_attrs::HtmlEscaper;

    fn apply(name: &str, value: Value, args: &[Value]) -> Result<Value, TemplateError> {
        let (_, filter) = builtin_filters()
            .into_iter()
            .find(|(n, _)| *n == name)
            .unwrap();
        filter(value, args, &HtmlEscaper)
    }

    #[test]
    fn test_safe() {
        assert_eq!(apply("safe", "<b>".into(), &[]).unwrap(), Value::safe("<b>"));
        assert_eq!(apply("safe", Value::Int(3), &[]).unwrap(), Value::safe("3"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            apply("escape", "<b>".into(), &[]).unwrap(),
            Value::safe("&lt;b&gt;")
        );
        assert_eq!(apply("e", Value::safe("<b>"), &[]).unwrap(), Value::safe("<b>"));
    }

    #[test]
    fn test_case_keeps_safeness() {
        assert_eq!(apply("upper", "ab".into(), &[]).unwrap(), Value::from("AB"));
        assert_eq!(
            apply("lower", Value::safe("<B>"), &[]).unwrap(),
            Value::safe("<b>")
        );
    }

    #[test]
    fn test_first() {
        assert_eq!(
            apply("first", vec!["a", "b"].into(), &[]).unwrap(),
            Value::from("a")
        );
        assert_eq!(
            apply("first", Value::List(vec![]), &[]).unwrap(),
            Value::Null
        );
        assert_eq!(apply("first", "xyz".into(), &[]).unwrap(), Value::from("x"));
        assert_eq!(apply("first", Value::Int(5), &[]).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_join() {
        assert_eq!(
            apply("join", vec!["a", "b"].into(), &[", ".into()]).unwrap(),
            Value::from("a, b")
        );
        assert_eq!(
            apply("join", vec![Value::Int(1), Value::Int(2)].into(), &[]).unwrap(),
            Value::from("12")
        );
    }

    #[test]
    fn test_default() {
        assert_eq!(
            apply("default", Value::Null, &["x".into()]).unwrap(),
            Value::from("x")
        );
        assert_eq!(
            apply("default", "".into(), &["x".into()]).unwrap(),
            Value::from("")
        );
        assert_eq!(
            apply("default", "".into(), &["x".into(), true.into()]).unwrap(),
            Value::from("x")
        );
        assert!(matches!(
            apply("default", Value::Null, &[]),
            Err(TemplateError::Filter { name, .. }) if name == "default"
        ));
    }
}

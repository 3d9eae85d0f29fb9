//! # Attribute serializer
//!
//! Turns an attribute list into the text that goes between the element name and
//! the closing `>`:
//!
//! ```text
//! ["checked", {class: ["a", "a", "b"], style: {x: true, y: false}}]
//!   => checked class="a b" style="x"
//! ```
//!
//! ## Rules
//!
//! - **Flags**: bare tokens, escaped; a list of flags is flattened one level
//! - **Lists**: entries escaped, deduplicated within the value, space-joined
//! - **Safe strings**: inserted verbatim
//! - **Flag maps**: only keys with a truthy flag, in their original order
//! - **Scalars**: escaped, nullish becomes `key=""`
//!
//! Keys are always escaped. The reserved `__keywords` key is never emitted, neither
//! as an attribute nor as a key of a flag map.
//! Every produced token goes into one insertion-ordered set, so an attribute
//! contributed twice with the same value appears once, at its first position.

use indexmap::IndexSet;

use crate::error::AttrError;
use crate::escape::Escaper;
use crate::value::{attrs_from_value, AttrItem, AttrValue, Value};

/// Map key carrying argument metadata, never emitted as an attribute
pub const RESERVED_KEY: &str = "__keywords";

pub fn serialize_attributes(attrs: &[AttrItem], escaper: &dyn Escaper) -> String {
    let mut tokens: IndexSet<String> = IndexSet::new();

    for item in attrs {
        match item {
            AttrItem::Flag(flag) => {
                push_token(&mut tokens, flag.escaped(escaper));
            }
            AttrItem::Flags(flags) => {
                for flag in flags {
                    push_token(&mut tokens, flag.escaped(escaper));
                }
            }
            AttrItem::Map(map) => {
                for (key, value) in map {
                    if key == RESERVED_KEY {
                        continue;
                    }
                    push_token(&mut tokens, pack_pair(key, value, escaper));
                }
            }
        }
    }

    tokens.into_iter().collect::<Vec<_>>().join(" ")
}

/// Classify and serialize an evaluated attribute list. Fails unless `value` is a list.
pub fn serialize_value(value: &Value, escaper: &dyn Escaper) -> Result<String, AttrError> {
    let attrs = attrs_from_value(value)?;
    Ok(serialize_attributes(&attrs, escaper))
}

fn push_token(tokens: &mut IndexSet<String>, token: String) {
    // An empty flag would only leave a double space behind
    if !token.is_empty() {
        tokens.insert(token);
    }
}

fn pack_pair(key: &str, value: &AttrValue, escaper: &dyn Escaper) -> String {
    let packed = match value {
        AttrValue::List(entries) => {
            let unique: IndexSet<String> = entries.iter().map(|e| e.escaped(escaper)).collect();
            unique.into_iter().collect::<Vec<_>>().join(" ")
        }
        AttrValue::Safe(safe) => safe.as_str().to_string(),
        AttrValue::Flags(flags) => flags
            .iter()
            .filter(|(flag, on)| **on && flag.as_str() != RESERVED_KEY)
            .map(|(flag, _)| escaper.escape(flag))
            .collect::<Vec<_>>()
            .join(" "),
        AttrValue::Scalar(scalar) => scalar.escaped(escaper),
    };
    format!("{}=\"{}\"", escaper.escape(key), packed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escape::{HtmlEscaper, SafeString};
    use crate::value::Scalar;
    use indexmap::IndexMap;

    fn serialize(value: Value) -> String {
        serialize_value(&value, &HtmlEscaper).unwrap()
    }

    // #######################################
    // FLAGS
    // #######################################

    #[test]
    fn test_empty_list() {
        assert_eq!(serialize(Value::List(vec![])), "");
    }

    #[test]
    fn test_single_flag() {
        assert_eq!(serialize(Value::from(vec!["checked"])), "checked");
    }

    #[test]
    fn test_duplicate_flags() {
        assert_eq!(serialize(Value::from(vec!["checked", "checked"])), "checked");
    }

    #[test]
    fn test_number_flag() {
        assert_eq!(
            serialize(Value::from(vec![Value::Int(2), Value::Float(2.5)])),
            "2 2.5"
        );
    }

    #[test]
    fn test_flag_list_is_flattened() {
        let value = Value::from(vec![
            Value::from(vec!["a", "b"]),
            Value::from("a"),
            Value::from(vec!["c"]),
        ]);
        assert_eq!(serialize(value), "a b c");
    }

    #[test]
    fn test_flag_is_escaped() {
        assert_eq!(serialize(Value::from(vec!["<x>"])), "&lt;x&gt;");
    }

    #[test]
    fn test_safe_flag_is_not_escaped() {
        assert_eq!(serialize(Value::from(vec![Value::safe("<x>")])), "<x>");
    }

    #[test]
    fn test_empty_flag_is_dropped() {
        assert_eq!(serialize(Value::from(vec!["", "a", ""])), "a");
    }

    // #######################################
    // KEYED ATTRIBUTES
    // #######################################

    #[test]
    fn test_scalar_value() {
        let value = Value::from(vec![Value::map([("alt", "bb"), ("id", "x")])]);
        assert_eq!(serialize(value), r#"alt="bb" id="x""#);
    }

    #[test]
    fn test_number_and_bool_values() {
        let value = Value::from(vec![Value::map([
            ("n", Value::Int(5)),
            ("f", Value::Float(0.5)),
            ("b", Value::Bool(false)),
        ])]);
        assert_eq!(serialize(value), r#"n="5" f="0.5" b="false""#);
    }

    #[test]
    fn test_list_value_is_deduplicated() {
        let value = Value::from(vec![Value::map([("class", vec!["a", "a", "b"])])]);
        assert_eq!(serialize(value), r#"class="a b""#);
    }

    #[test]
    fn test_list_value_dedup_after_escaping() {
        let value = Value::from(vec![Value::map([(
            "class",
            Value::from(vec![Value::from("&"), Value::safe("&amp;")]),
        )])]);
        assert_eq!(serialize(value), r#"class="&amp;""#);
    }

    #[test]
    fn test_safe_value_is_not_escaped() {
        let value = Value::from(vec![Value::map([("a", Value::safe("<script"))])]);
        assert_eq!(serialize(value), r#"a="<script""#);
    }

    #[test]
    fn test_flag_map_keeps_truthy_keys_in_order() {
        let value = Value::from(vec![Value::map([(
            "style",
            Value::map([("a", true), ("b", false), ("c", true)]),
        )])]);
        assert_eq!(serialize(value), r#"style="a c""#);
    }

    #[test]
    fn test_flag_map_without_truthy_keys() {
        let value = Value::from(vec![Value::map([(
            "style",
            Value::map([("a", Value::Bool(false)), ("b", Value::Null)]),
        )])]);
        assert_eq!(serialize(value), r#"style="""#);
    }

    #[test]
    fn test_flag_map_keys_are_escaped() {
        let value = Value::from(vec![Value::map([("class", Value::map([("<b>", true)]))])]);
        assert_eq!(serialize(value), r#"class="&lt;b&gt;""#);
    }

    #[test]
    fn test_nullish_value() {
        let value = Value::from(vec![Value::map([("x", Value::Null)])]);
        assert_eq!(serialize(value), r#"x="""#);
    }

    #[test]
    fn test_key_is_escaped() {
        let value = Value::from(vec![Value::map([("<script>", "as")])]);
        assert_eq!(serialize(value), r#"&lt;script&gt;="as""#);
    }

    #[test]
    fn test_reserved_key_is_not_emitted() {
        let value = Value::from(vec![Value::map([
            (RESERVED_KEY, Value::Bool(true)),
            ("a", Value::from("b")),
        ])]);
        assert_eq!(serialize(value), r#"a="b""#);

        let only_reserved = Value::from(vec![Value::map([(RESERVED_KEY, "anything")])]);
        assert_eq!(serialize(only_reserved), "");
    }

    #[test]
    fn test_reserved_key_is_not_emitted_from_flag_map() {
        let value = Value::from(vec![Value::map([(
            "style",
            Value::map([(RESERVED_KEY, true), ("a", true)]),
        )])]);
        assert_eq!(serialize(value), r#"style="a""#);

        let attrs = vec![AttrItem::map([(
            "style",
            AttrValue::Flags(IndexMap::from([(RESERVED_KEY.to_string(), true)])),
        )])];
        assert_eq!(serialize_attributes(&attrs, &HtmlEscaper), r#"style="""#);
    }

    // #######################################
    // ESCAPING
    // #######################################

    #[test]
    fn test_value_escaping() {
        let cases = [
            ("<script>alert(1)</script>", "&lt;script&gt;alert(1)&lt;/script&gt;"),
            ("<", "&lt;"),
            (">", "&gt;"),
            ("&", "&amp;"),
            ("'", "&#39;"),
            (r#"{"a":"b"}"#, "{&quot;a&quot;:&quot;b&quot;}"),
        ];
        for (input, expected) in cases {
            let value = Value::from(vec![Value::map([("class", input)])]);
            assert_eq!(serialize(value), format!("class=\"{}\"", expected));
        }
    }

    #[test]
    fn test_value_escaped_once() {
        let value = Value::from(vec![Value::map([("title", "a&b")]), Value::from("a&b")]);
        assert_eq!(serialize(value), r#"title="a&amp;b" a&amp;b"#);
    }

    // #######################################
    // ORDERING AND DEDUPLICATION
    // #######################################

    #[test]
    fn test_order_of_first_appearance() {
        let value = Value::from(vec![
            Value::from("readonly"),
            Value::map([("class", vec!["a"])]),
            Value::from("readonly"),
        ]);
        assert_eq!(serialize(value), r#"readonly class="a""#);
    }

    #[test]
    fn test_identical_pairs_collapse() {
        let value = Value::from(vec![
            Value::map([("id", "x")]),
            Value::map([("id", "x")]),
            Value::map([("id", "y")]),
        ]);
        assert_eq!(serialize(value), r#"id="x" id="y""#);
    }

    #[test]
    fn test_mixed_attributes() {
        let value = Value::from(vec![
            Value::from("readonly"),
            Value::from("a2"),
            Value::map([
                ("data-attr1", Value::from("some attr")),
                ("data-attr2", Value::Int(5)),
                ("class", Value::from(vec!["a1", "a2", "a1", "foo"])),
                ("style", Value::map([("a", true), ("b", false), ("c", true)])),
                ("undefinedValue", Value::Null),
                (RESERVED_KEY, Value::Bool(true)),
            ]),
        ]);
        assert_eq!(
            serialize(value),
            r#"readonly a2 data-attr1="some attr" data-attr2="5" class="a1 a2 foo" style="a c" undefinedValue="""#
        );
    }

    // #######################################
    // TYPED INPUT
    // #######################################

    #[test]
    fn test_typed_attributes() {
        let attrs = vec![
            AttrItem::from("checked"),
            AttrItem::map([
                ("class", AttrValue::List(vec![Scalar::from("x"), Scalar::from("x")])),
                ("raw", AttrValue::Safe(SafeString::new("<i>"))),
                ("flags", AttrValue::Flags(IndexMap::from([("on".to_string(), true)]))),
            ]),
        ];
        assert_eq!(
            serialize_attributes(&attrs, &HtmlEscaper),
            r#"checked class="x" raw="<i>" flags="on""#
        );
    }

    #[test]
    fn test_non_list_input_errors() {
        let result = serialize_value(&Value::map([("class", "a")]), &HtmlEscaper);
        assert!(matches!(result, Err(AttrError::InvalidArgument(_))));

        let result = serialize_value(&Value::from("checked"), &HtmlEscaper);
        assert!(matches!(result, Err(AttrError::InvalidArgument(_))));
    }
}

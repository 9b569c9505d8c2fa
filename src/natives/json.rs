//! JSON encoding and decoding for the `json` native module.
//!
//! Type mapping:
//! - Mrya map ↔ JSON object (keys stringified)
//! - Mrya list ↔ JSON array
//! - Mrya int/float ↔ JSON number
//! - Mrya string ↔ JSON string
//! - Mrya bool ↔ JSON boolean
//! - Mrya nil ↔ JSON null

use super::{arg_int, arg_str, check_arity, check_arity_range};
use crate::error::NativeError;
use crate::value::{list_value, map_value, MapKey, Value};
use mrya_macros::native;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// Serialization adapter so any Mrya value feeds straight into a serde
/// serializer.
struct Json<'a>(&'a Value);

impl Serialize for Json<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Nil => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let items = items.borrow();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(&Json(item))?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let entries = entries.borrow();
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries.iter() {
                    map.serialize_entry(&key.to_string(), &Json(value))?;
                }
                map.end()
            }
            other => Err(S::Error::custom(format!(
                "cannot convert {} to JSON",
                other.type_name()
            ))),
        }
    }
}

fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::Str(s.clone()),
        serde_json::Value::Array(items) => list_value(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(object) => {
            let mut entries = HashMap::with_capacity(object.len());
            for (key, value) in object {
                entries.insert(MapKey::Str(key.clone()), json_to_value(value));
            }
            map_value(entries)
        }
    }
}

#[native(module = "json", name = "parse")]
pub fn parse(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("parse", args, 1)?;
    let text = arg_str("parse", args, 0)?;
    let json: serde_json::Value = serde_json::from_str(text)
        .map_err(|err| NativeError::msg(format!("Failed to parse JSON: {err}")))?;
    Ok(json_to_value(&json))
}

#[native(module = "json", name = "stringify")]
pub fn stringify(args: &[Value]) -> Result<Value, NativeError> {
    check_arity_range("stringify", args, 1, 2)?;

    let indent = match args.get(1) {
        Some(Value::Nil) | None => None,
        Some(_) => {
            let width = arg_int("stringify", args, 1)?;
            if width < 0 {
                return Err(NativeError::msg("stringify: indent must be non-negative."));
            }
            Some(width as usize)
        }
    };

    let encoded = match indent {
        None => serde_json::to_string(&Json(&args[0])),
        Some(width) => {
            let indent_text = " ".repeat(width);
            let mut out = Vec::new();
            let result = {
                let formatter =
                    serde_json::ser::PrettyFormatter::with_indent(indent_text.as_bytes());
                let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
                Json(&args[0]).serialize(&mut serializer)
            };
            result.map(|_| String::from_utf8_lossy(&out).into_owned())
        }
    };

    encoded
        .map(Value::Str)
        .map_err(|err| NativeError::msg(format!("Failed to stringify to JSON: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_and_numbers() {
        let parsed = parse(&[Value::Str(r#"{"a": 1, "b": 2.5, "c": null}"#.into())]).unwrap();
        let Value::Map(entries) = parsed else {
            panic!("expected map");
        };
        let entries = entries.borrow();
        assert_eq!(entries.get(&MapKey::Str("a".into())), Some(&Value::Int(1)));
        assert_eq!(
            entries.get(&MapKey::Str("b".into())),
            Some(&Value::Float(2.5))
        );
        assert_eq!(entries.get(&MapKey::Str("c".into())), Some(&Value::Nil));
    }

    #[test]
    fn test_parse_array() {
        let parsed = parse(&[Value::Str("[1, \"two\", true]".into())]).unwrap();
        assert_eq!(
            parsed,
            list_value(vec![
                Value::Int(1),
                Value::Str("two".into()),
                Value::Bool(true)
            ])
        );
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(parse(&[Value::Str("{nope".into())]).is_err());
    }

    #[test]
    fn test_stringify_round_trips() {
        let list = list_value(vec![Value::Int(1), Value::Nil, Value::Str("x".into())]);
        let Value::Str(encoded) = stringify(&[list]).unwrap() else {
            panic!("expected string");
        };
        assert_eq!(encoded, "[1,null,\"x\"]");
    }

    #[test]
    fn test_stringify_pretty_indent() {
        let list = list_value(vec![Value::Int(1)]);
        let Value::Str(encoded) = stringify(&[list, Value::Int(2)]).unwrap() else {
            panic!("expected string");
        };
        assert_eq!(encoded, "[\n  1\n]");
    }

    #[test]
    fn test_stringify_rejects_functions() {
        let module = crate::value::Value::Native(crate::value::NativeValue {
            name: "f".into(),
            call: crate::value::NativeCall::Pure(|_| Ok(Value::Nil)),
        });
        assert!(stringify(&[module]).is_err());
    }
}

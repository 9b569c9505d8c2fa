//! Global builtin functions: conversions, input, error raising, import,
//! file fetch/store, and the list and map helper commands.

use super::{arg_int, arg_list, arg_map, arg_str, check_arity, check_arity_range};
use crate::error::NativeError;
use crate::eval::Interpreter;
use crate::value::{list_value, MapKey, Value};
use mrya_macros::native;
use std::io::Write;

#[native(module = "builtins", name = "to_int")]
pub fn to_int(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("to_int", args, 1)?;
    let converted = match &args[0] {
        Value::Int(i) => Some(*i),
        Value::Float(f) => Some(*f as i64),
        Value::Bool(b) => Some(i64::from(*b)),
        // Going through float first handles inputs like "123.45"
        Value::Str(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    };
    converted.map(Value::Int).ok_or_else(|| {
        NativeError::msg(format!("Cannot convert '{}' to int.", args[0]))
    })
}

#[native(module = "builtins", name = "to_float")]
pub fn to_float(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("to_float", args, 1)?;
    let converted = match &args[0] {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        Value::Str(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    converted.map(Value::Float).ok_or_else(|| {
        NativeError::msg(format!("Cannot convert '{}' to float.", args[0]))
    })
}

#[native(module = "builtins", name = "to_bool")]
pub fn to_bool(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("to_bool", args, 1)?;
    match &args[0] {
        Value::Str(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Value::Bool(true)),
            "false" | "no" | "0" => Ok(Value::Bool(false)),
            _ => Err(NativeError::msg(format!("Cannot convert '{s}' to bool."))),
        },
        other => Ok(Value::Bool(other.is_truthy())),
    }
}

#[native(module = "builtins", name = "length", interp)]
pub fn length(interp: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    check_arity("length", args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        Value::List(items) => Ok(Value::Int(items.borrow().len() as i64)),
        Value::Map(entries) => Ok(Value::Int(entries.borrow().len() as i64)),
        Value::Instance(instance) => interp
            .call_instance_method(instance, "_len_", vec![])
            .map_err(NativeError::from),
        other => Err(NativeError::msg(format!(
            "Cannot get length of type '{}'.",
            other.type_name()
        ))),
    }
}

#[native(module = "builtins", name = "request")]
pub fn request(args: &[Value]) -> Result<Value, NativeError> {
    check_arity_range("request", args, 1, 3)?;
    let prompt = args[0].to_string();
    let validation = match args.get(1) {
        Some(Value::Str(s)) => Some(s.clone()),
        Some(Value::Nil) | None => None,
        Some(other) => {
            return Err(NativeError::msg(format!(
                "request: validation type must be a string, got {}.",
                other.type_name()
            )));
        }
    };
    let default = args.get(2).cloned();

    loop {
        print!("{prompt} ");
        std::io::stdout()
            .flush()
            .map_err(|err| NativeError::msg(format!("request: {err}")))?;

        let mut line = String::new();
        let read = std::io::stdin()
            .read_line(&mut line)
            .map_err(|err| NativeError::msg(format!("request: {err}")))?;
        if read == 0 {
            return match &default {
                Some(value) => Ok(value.clone()),
                None => Err(NativeError::msg("request: unexpected end of input.")),
            };
        }
        let input = line.trim_end_matches(['\n', '\r']);

        if input.trim().is_empty() {
            if let Some(value) = &default {
                return Ok(value.clone());
            }
        }

        match validation.as_deref() {
            None | Some("string") => return Ok(Value::Str(input.to_string())),
            Some("number") => {
                if input.contains('.') {
                    if let Ok(f) = input.trim().parse::<f64>() {
                        return Ok(Value::Float(f));
                    }
                } else if let Ok(i) = input.trim().parse::<i64>() {
                    return Ok(Value::Int(i));
                }
                println!("Invalid number, please try again.");
            }
            Some("bool") => match input.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" | "y" => return Ok(Value::Bool(true)),
                "false" | "no" | "0" | "n" => return Ok(Value::Bool(false)),
                _ => println!("Invalid boolean, please enter yes/no, true/false, or 1/0."),
            },
            Some(other) => {
                println!("Unknown validation type '{other}'. Please try again.");
            }
        }
    }
}

#[native(module = "builtins", name = "raise")]
pub fn raise(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("raise", args, 1)?;
    Err(NativeError::raised(args[0].to_string()))
}

#[native(module = "builtins", name = "assert")]
pub fn assert_eq_values(args: &[Value]) -> Result<Value, NativeError> {
    check_arity_range("assert", args, 2, 3)?;
    let condition = &args[0];
    let expected = &args[1];
    if condition != expected {
        let message = match args.get(2) {
            Some(note) => format!(
                "Assertion failed: {note}. Expected '{expected}', but got '{condition}'."
            ),
            None => format!("Assertion failed: expected '{expected}', but got '{condition}'."),
        };
        return Err(NativeError::raised(message));
    }
    Ok(Value::Nil)
}

#[native(module = "builtins", name = "import", interp)]
pub fn import(interp: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    check_arity("import", args, 1)?;
    let path = arg_str("import", args, 0)?;
    interp.load_module(path, None).map_err(NativeError::from)
}

#[native(module = "builtins", name = "fetch", interp)]
pub fn fetch(interp: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    check_arity("fetch", args, 1)?;
    let path = arg_str("fetch", args, 0)?;
    let resolved = interp.resolve_path(path);

    if !resolved.exists() {
        // A fetch of a missing file seeds it with a greeting
        let default_content = if path.ends_with(".mrya") {
            "output(\"Hello from Mrya!\")\n"
        } else {
            "Hello from Mrya!\n"
        };
        std::fs::write(&resolved, default_content).map_err(|err| {
            NativeError::msg(format!("Failed to create file '{path}': {err}"))
        })?;
    }

    std::fs::read_to_string(&resolved)
        .map(Value::Str)
        .map_err(|err| NativeError::msg(format!("Failed to read file '{path}': {err}")))
}

#[native(module = "builtins", name = "store", interp)]
pub fn store(interp: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    check_arity("store", args, 2)?;
    let path = arg_str("store", args, 0)?;
    let content = args[1].to_string().replace("\\n", "\n");
    let resolved = interp.resolve_path(path);
    std::fs::write(&resolved, content)
        .map(|_| Value::Nil)
        .map_err(|err| NativeError::msg(format!("Failed to write to file '{path}': {err}")))
}

#[native(module = "builtins", name = "append_to", interp)]
pub fn append_to(interp: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    check_arity("append_to", args, 2)?;
    let path = arg_str("append_to", args, 0)?;
    let content = args[1].to_string().replace("\\n", "\n");
    let resolved = interp.resolve_path(path);
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(&resolved)
        .map_err(|err| NativeError::msg(format!("Failed to append to file '{path}': {err}")))?;
    file.write_all(content.as_bytes())
        .map(|_| Value::Nil)
        .map_err(|err| NativeError::msg(format!("Failed to append to file '{path}': {err}")))
}

// --- List commands ---

#[native(module = "builtins", name = "list")]
pub fn list_create(args: &[Value]) -> Result<Value, NativeError> {
    Ok(list_value(args.to_vec()))
}

#[native(module = "builtins", name = "get")]
pub fn list_get(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("get", args, 2)?;
    let items = arg_list("get", args, 0)?;
    let index = arg_int("get", args, 1)?;
    let items = items.borrow();
    resolve_list_index(index, items.len())
        .map(|i| items[i].clone())
        .ok_or_else(|| NativeError::msg(format!("Index {index} out of range or invalid.")))
}

#[native(module = "builtins", name = "set")]
pub fn list_set(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("set", args, 3)?;
    let items = arg_list("set", args, 0)?;
    let index = arg_int("set", args, 1)?;
    let len = items.borrow().len();
    match resolve_list_index(index, len) {
        Some(i) => {
            items.borrow_mut()[i] = args[2].clone();
            Ok(Value::Nil)
        }
        None => Err(NativeError::msg(format!(
            "Index {index} out of range or invalid."
        ))),
    }
}

#[native(module = "builtins", name = "append")]
pub fn list_append(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("append", args, 2)?;
    let items = arg_list("append", args, 0)?;
    items.borrow_mut().push(args[1].clone());
    Ok(Value::Nil)
}

#[native(module = "builtins", name = "pop")]
pub fn list_pop(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("pop", args, 1)?;
    let items = arg_list("pop", args, 0)?;
    let popped = items.borrow_mut().pop();
    popped.ok_or_else(|| NativeError::msg("Cannot pop from empty list."))
}

#[native(module = "builtins", name = "insert")]
pub fn list_insert(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("insert", args, 3)?;
    let items = arg_list("insert", args, 0)?;
    let index = arg_int("insert", args, 1)?;
    let mut items = items.borrow_mut();
    let len = items.len();
    let position = if index < 0 {
        (index + len as i64).max(0) as usize
    } else {
        (index as usize).min(len)
    };
    items.insert(position, args[2].clone());
    Ok(Value::Nil)
}

#[native(module = "builtins", name = "remove")]
pub fn list_remove(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("remove", args, 2)?;
    let items = arg_list("remove", args, 0)?;
    let index = arg_int("remove", args, 1)?;
    let len = items.borrow().len();
    match resolve_list_index(index, len) {
        Some(i) => Ok(items.borrow_mut().remove(i)),
        None => Err(NativeError::msg(format!(
            "Index {index} out of range or invalid."
        ))),
    }
}

#[native(module = "builtins", name = "list_slice")]
pub fn list_slice(args: &[Value]) -> Result<Value, NativeError> {
    check_arity_range("list_slice", args, 2, 3)?;
    let items = arg_list("list_slice", args, 0)?;
    let items = items.borrow();
    let len = items.len() as i64;

    let clamp = |raw: i64| -> usize {
        let resolved = if raw < 0 { raw + len } else { raw };
        resolved.clamp(0, len) as usize
    };

    let start = clamp(arg_int("list_slice", args, 1)?);
    let end = match args.get(2) {
        Some(Value::Nil) | None => len as usize,
        Some(_) => clamp(arg_int("list_slice", args, 2)?),
    };

    if start >= end {
        return Ok(list_value(Vec::new()));
    }
    Ok(list_value(items[start..end].to_vec()))
}

// --- Map commands ---

#[native(module = "builtins", name = "map")]
pub fn map_create(args: &[Value]) -> Result<Value, NativeError> {
    if args.len() % 2 != 0 {
        return Err(NativeError::msg(
            "map() requires an even number of arguments (key-value pairs).",
        ));
    }
    let mut entries = std::collections::HashMap::new();
    for pair in args.chunks(2) {
        let key = map_key(&pair[0])?;
        entries.insert(key, pair[1].clone());
    }
    Ok(crate::value::map_value(entries))
}

#[native(module = "builtins", name = "map_get")]
pub fn map_get(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("map_get", args, 2)?;
    let entries = arg_map("map_get", args, 0)?;
    let key = map_key(&args[1])?;
    let value = entries.borrow().get(&key).cloned();
    value.ok_or_else(|| NativeError::msg(format!("Key '{}' not found in map.", args[1])))
}

#[native(module = "builtins", name = "map_set")]
pub fn map_set(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("map_set", args, 3)?;
    let entries = arg_map("map_set", args, 0)?;
    let key = map_key(&args[1])?;
    entries.borrow_mut().insert(key, args[2].clone());
    Ok(Value::Nil)
}

#[native(module = "builtins", name = "map_has")]
pub fn map_has(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("map_has", args, 2)?;
    let entries = arg_map("map_has", args, 0)?;
    let key = map_key(&args[1])?;
    let present = entries.borrow().contains_key(&key);
    Ok(Value::Bool(present))
}

#[native(module = "builtins", name = "map_keys")]
pub fn map_keys(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("map_keys", args, 1)?;
    let entries = arg_map("map_keys", args, 0)?;
    let keys = entries.borrow().keys().map(MapKey::to_value).collect();
    Ok(list_value(keys))
}

#[native(module = "builtins", name = "map_values")]
pub fn map_values(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("map_values", args, 1)?;
    let entries = arg_map("map_values", args, 0)?;
    let values = entries.borrow().values().cloned().collect();
    Ok(list_value(values))
}

#[native(module = "builtins", name = "map_delete")]
pub fn map_delete(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("map_delete", args, 2)?;
    let entries = arg_map("map_delete", args, 0)?;
    let key = map_key(&args[1])?;
    let removed = entries.borrow_mut().remove(&key).is_some();
    Ok(Value::Bool(removed))
}

fn map_key(value: &Value) -> Result<MapKey, NativeError> {
    MapKey::from_value(value).ok_or_else(|| {
        NativeError::msg(format!(
            "Map keys must be strings or numbers. Got {}.",
            value.type_name()
        ))
    })
}

fn resolve_list_index(raw: i64, len: usize) -> Option<usize> {
    let resolved = if raw < 0 { raw + len as i64 } else { raw };
    if resolved >= 0 && (resolved as usize) < len {
        Some(resolved as usize)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_int_conversions() {
        assert_eq!(to_int(&[Value::Str("123.45".into())]).unwrap(), Value::Int(123));
        assert_eq!(to_int(&[Value::Float(9.9)]).unwrap(), Value::Int(9));
        assert_eq!(to_int(&[Value::Bool(true)]).unwrap(), Value::Int(1));
        assert!(to_int(&[Value::Str("abc".into())]).is_err());
    }

    #[test]
    fn test_to_bool_strings() {
        assert_eq!(to_bool(&[Value::Str("YES".into())]).unwrap(), Value::Bool(true));
        assert_eq!(to_bool(&[Value::Str("0".into())]).unwrap(), Value::Bool(false));
        assert!(to_bool(&[Value::Str("maybe".into())]).is_err());
        assert_eq!(to_bool(&[Value::Int(0)]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_list_commands() {
        let list = list_create(&[Value::Int(1), Value::Int(2)]).unwrap();
        assert_eq!(
            list_get(&[list.clone(), Value::Int(-1)]).unwrap(),
            Value::Int(2)
        );
        list_append(&[list.clone(), Value::Int(3)]).unwrap();
        assert_eq!(
            list_get(&[list.clone(), Value::Int(2)]).unwrap(),
            Value::Int(3)
        );
        assert_eq!(list_pop(&[list.clone()]).unwrap(), Value::Int(3));
        assert!(list_get(&[list, Value::Int(5)]).is_err());
    }

    #[test]
    fn test_list_slice_clamps() {
        let list = list_create(&[Value::Int(1), Value::Int(2), Value::Int(3)]).unwrap();
        let sliced = list_slice(&[list.clone(), Value::Int(1)]).unwrap();
        assert_eq!(
            sliced,
            list_create(&[Value::Int(2), Value::Int(3)]).unwrap()
        );
        let empty = list_slice(&[list, Value::Int(5), Value::Int(9)]).unwrap();
        assert_eq!(empty, list_create(&[]).unwrap());
    }

    #[test]
    fn test_map_commands() {
        let map = map_create(&[Value::Str("a".into()), Value::Int(1)]).unwrap();
        assert_eq!(
            map_get(&[map.clone(), Value::Str("a".into())]).unwrap(),
            Value::Int(1)
        );
        assert!(map_get(&[map.clone(), Value::Str("b".into())]).is_err());
        map_set(&[map.clone(), Value::Str("b".into()), Value::Int(2)]).unwrap();
        assert_eq!(
            map_has(&[map.clone(), Value::Str("b".into())]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            map_delete(&[map.clone(), Value::Str("b".into())]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            map_delete(&[map, Value::Str("b".into())]).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_map_requires_even_arguments() {
        assert!(map_create(&[Value::Str("a".into())]).is_err());
    }

    #[test]
    fn test_assert_messages() {
        assert!(assert_eq_values(&[Value::Int(1), Value::Int(1)]).is_ok());
        let err = assert_eq_values(&[Value::Int(1), Value::Int(2)]).unwrap_err();
        assert!(matches!(err, NativeError::Raised(_)));
    }

    #[test]
    fn test_raise_produces_raised_error() {
        let err = raise(&[Value::Str("bad".into())]).unwrap_err();
        assert!(matches!(err, NativeError::Raised(message) if message == "bad"));
    }
}

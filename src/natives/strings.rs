//! String manipulation for the `string` native module.
//!
//! These functions take the subject string as their first argument. The
//! evaluator also exposes them as string properties with the receiver
//! pre-bound, so `"abc".upper()` and `string.upper("abc")` agree.

use super::{arg_str, check_arity};
use crate::error::NativeError;
use crate::value::{list_value, Value};
use mrya_macros::native;

#[native(module = "string", name = "upper")]
pub fn upper(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("upper", args, 1)?;
    Ok(Value::Str(args[0].to_string().to_uppercase()))
}

#[native(module = "string", name = "lower")]
pub fn lower(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("lower", args, 1)?;
    Ok(Value::Str(args[0].to_string().to_lowercase()))
}

#[native(module = "string", name = "trim")]
pub fn trim(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("trim", args, 1)?;
    Ok(Value::Str(args[0].to_string().trim().to_string()))
}

#[native(module = "string", name = "replace")]
pub fn replace(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("replace", args, 3)?;
    let subject = args[0].to_string();
    let old = args[1].to_string();
    let new = args[2].to_string();
    Ok(Value::Str(subject.replace(&old, &new)))
}

#[native(module = "string", name = "split")]
pub fn split(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("split", args, 2)?;
    let subject = arg_str("split", args, 0)?;
    let separator = arg_str("split", args, 1)?;
    if separator.is_empty() {
        return Err(NativeError::msg("split: separator must not be empty."));
    }
    let parts = subject
        .split(separator)
        .map(|part| Value::Str(part.to_string()))
        .collect();
    Ok(list_value(parts))
}

#[native(module = "string", name = "contains")]
pub fn contains(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("contains", args, 2)?;
    let subject = arg_str("contains", args, 0)?;
    let needle = arg_str("contains", args, 1)?;
    Ok(Value::Bool(subject.contains(needle)))
}

#[native(module = "string", name = "starts_with")]
pub fn starts_with(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("starts_with", args, 2)?;
    let subject = arg_str("starts_with", args, 0)?;
    let prefix = arg_str("starts_with", args, 1)?;
    Ok(Value::Bool(subject.starts_with(prefix)))
}

#[native(module = "string", name = "ends_with")]
pub fn ends_with(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("ends_with", args, 2)?;
    let subject = arg_str("ends_with", args, 0)?;
    let suffix = arg_str("ends_with", args, 1)?;
    Ok(Value::Bool(subject.ends_with(suffix)))
}

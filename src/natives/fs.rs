//! Filesystem queries for the `fs` native module.
//!
//! Paths resolve against the directory of the file currently being
//! executed, so these natives are interpreter-aware.

use super::{arg_str, check_arity, check_arity_range};
use crate::error::NativeError;
use crate::eval::Interpreter;
use crate::value::{list_value, Value};
use mrya_macros::native;

#[native(module = "fs", name = "exists", interp)]
pub fn exists(interp: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    check_arity("exists", args, 1)?;
    let path = interp.resolve_path(arg_str("exists", args, 0)?);
    Ok(Value::Bool(path.exists()))
}

#[native(module = "fs", name = "is_file", interp)]
pub fn is_file(interp: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    check_arity("is_file", args, 1)?;
    let path = interp.resolve_path(arg_str("is_file", args, 0)?);
    Ok(Value::Bool(path.is_file()))
}

#[native(module = "fs", name = "is_dir", interp)]
pub fn is_dir(interp: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    check_arity("is_dir", args, 1)?;
    let path = interp.resolve_path(arg_str("is_dir", args, 0)?);
    Ok(Value::Bool(path.is_dir()))
}

#[native(module = "fs", name = "list_dir", interp)]
pub fn list_dir(interp: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    check_arity_range("list_dir", args, 0, 1)?;
    let path = match args.first() {
        Some(_) => interp.resolve_path(arg_str("list_dir", args, 0)?),
        None => interp.current_dir(),
    };
    let entries = std::fs::read_dir(&path)
        .map_err(|err| NativeError::msg(format!("list_dir: {}: {err}", path.display())))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| NativeError::msg(format!("list_dir: {err}")))?;
        names.push(Value::Str(entry.file_name().to_string_lossy().into_owned()));
    }
    Ok(list_value(names))
}

#[native(module = "fs", name = "get_size", interp)]
pub fn get_size(interp: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    check_arity("get_size", args, 1)?;
    let path = interp.resolve_path(arg_str("get_size", args, 0)?);
    let metadata = std::fs::metadata(&path)
        .map_err(|err| NativeError::msg(format!("get_size: {}: {err}", path.display())))?;
    Ok(Value::Int(metadata.len() as i64))
}

#[native(module = "fs", name = "make_dir", interp)]
pub fn make_dir(interp: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    check_arity("make_dir", args, 1)?;
    let path = interp.resolve_path(arg_str("make_dir", args, 0)?);
    std::fs::create_dir_all(&path)
        .map(|_| Value::Nil)
        .map_err(|err| NativeError::msg(format!("make_dir: {}: {err}", path.display())))
}

#[native(module = "fs", name = "remove_file", interp)]
pub fn remove_file(interp: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    check_arity("remove_file", args, 1)?;
    let path = interp.resolve_path(arg_str("remove_file", args, 0)?);
    std::fs::remove_file(&path)
        .map(|_| Value::Nil)
        .map_err(|err| NativeError::msg(format!("remove_file: {}: {err}", path.display())))
}

#[native(module = "fs", name = "remove_dir", interp)]
pub fn remove_dir(interp: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    check_arity("remove_dir", args, 1)?;
    let path = interp.resolve_path(arg_str("remove_dir", args, 0)?);
    std::fs::remove_dir_all(&path)
        .map(|_| Value::Nil)
        .map_err(|err| NativeError::msg(format!("remove_dir: {}: {err}", path.display())))
}

//! Clocks and date formatting for the `time` native module.

use super::{arg_num, arg_str, check_arity};
use crate::error::NativeError;
use crate::value::Value;
use chrono::format::{Item, StrftimeItems};
use chrono::Local;
use mrya_macros::native;
use std::time::{SystemTime, UNIX_EPOCH};

#[native(module = "time", name = "sleep")]
pub fn sleep(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("sleep", args, 1)?;
    let seconds = arg_num("sleep", args, 0)?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(NativeError::msg(format!(
            "sleep() requires a non-negative number, but got '{}'.",
            args[0]
        )));
    }
    std::thread::sleep(std::time::Duration::from_secs_f64(seconds));
    Ok(Value::Nil)
}

#[native(module = "time", name = "time")]
pub fn epoch_time(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("time", args, 0)?;
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| NativeError::msg(format!("time: {err}")))?;
    Ok(Value::Float(elapsed.as_secs_f64()))
}

#[native(module = "time", name = "datetime")]
pub fn datetime_now(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("datetime", args, 0)?;
    Ok(Value::Str(
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    ))
}

#[native(module = "time", name = "format_time")]
pub fn format_time(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("format_time", args, 1)?;
    let format = arg_str("format_time", args, 0)?;
    let items: Vec<Item> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(NativeError::msg(format!("Invalid format string: {format}")));
    }
    Ok(Value::Str(
        Local::now().format_with_items(items.into_iter()).to_string(),
    ))
}

#[native(module = "time", name = "get_time")]
pub fn get_time(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("get_time", args, 0)?;
    Ok(Value::Str(Local::now().format("%H:%M:%S").to_string()))
}

#[native(module = "time", name = "get_date")]
pub fn get_date(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("get_date", args, 0)?;
    Ok(Value::Str(Local::now().format("%Y-%m-%d").to_string()))
}

#[native(module = "time", name = "military_time")]
pub fn military_time(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("military_time", args, 0)?;
    get_time(args)
}

#[native(module = "time", name = "twelve_hour_time")]
pub fn twelve_hour_time(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("twelve_hour_time", args, 0)?;
    Ok(Value::Str(Local::now().format("%I:%M:%S %p").to_string()))
}

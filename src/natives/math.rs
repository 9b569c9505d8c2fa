//! Math helpers for the `math` native module.

use super::{arg_int, arg_num, check_arity};
use crate::error::NativeError;
use crate::value::Value;
use mrya_macros::native;
use rand::Rng;

#[native(module = "math", name = "abs")]
pub fn abs_fn(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("abs", args, 1)?;
    match &args[0] {
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| NativeError::msg("abs: integer overflow.")),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(NativeError::msg(format!(
            "abs: expected number, got {} at argument 1",
            other.type_name()
        ))),
    }
}

#[native(module = "math", name = "round")]
pub fn round_fn(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("round", args, 1)?;
    let value = arg_num("round", args, 0)?;
    Ok(Value::Int(value.round() as i64))
}

#[native(module = "math", name = "up")]
pub fn ceil_fn(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("up", args, 1)?;
    let value = arg_num("up", args, 0)?;
    Ok(Value::Int(value.ceil() as i64))
}

#[native(module = "math", name = "down")]
pub fn floor_fn(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("down", args, 1)?;
    let value = arg_num("down", args, 0)?;
    Ok(Value::Int(value.floor() as i64))
}

#[native(module = "math", name = "root")]
pub fn sqrt_fn(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("root", args, 1)?;
    let value = arg_num("root", args, 0)?;
    if value < 0.0 {
        return Err(NativeError::msg(
            "root() domain error: input must be non-negative.",
        ));
    }
    Ok(Value::Float(value.sqrt()))
}

#[native(module = "math", name = "random")]
pub fn random_fn(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("random", args, 0)?;
    Ok(Value::Float(rand::thread_rng().gen::<f64>()))
}

#[native(module = "math", name = "randint")]
pub fn randint_fn(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("randint", args, 2)?;
    let low = arg_int("randint", args, 0)?;
    let high = arg_int("randint", args, 1)?;
    if low > high {
        return Err(NativeError::msg(format!(
            "randint: empty range {low}..{high}."
        )));
    }
    Ok(Value::Int(rand::thread_rng().gen_range(low..=high)))
}

#[native(module = "math", name = "sin")]
pub fn sin_fn(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("sin", args, 1)?;
    Ok(Value::Float(arg_num("sin", args, 0)?.sin()))
}

#[native(module = "math", name = "cos")]
pub fn cos_fn(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("cos", args, 1)?;
    Ok(Value::Float(arg_num("cos", args, 0)?.cos()))
}

#[native(module = "math", name = "tan")]
pub fn tan_fn(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("tan", args, 1)?;
    Ok(Value::Float(arg_num("tan", args, 0)?.tan()))
}

#[native(module = "math", name = "log")]
pub fn log_fn(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("log", args, 1)?;
    let value = arg_num("log", args, 0)?;
    if value <= 0.0 {
        return Err(NativeError::msg(
            "log() domain error: input must be positive.",
        ));
    }
    Ok(Value::Float(value.ln()))
}

#[native(module = "math", name = "exp")]
pub fn exp_fn(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("exp", args, 1)?;
    Ok(Value::Float(arg_num("exp", args, 0)?.exp()))
}

#[native(module = "math", name = "pow")]
pub fn pow_fn(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("pow", args, 2)?;
    let base = arg_num("pow", args, 0)?;
    let exponent = arg_num("pow", args, 1)?;
    Ok(Value::Float(base.powf(exponent)))
}

//! HTTP client requests for the `http` native module.
//!
//! Requests carry a 30 second timeout. DNS lookup cannot be interrupted
//! and may hang if DNS is slow.

use super::{arg_str, check_arity};
use crate::error::NativeError;
use crate::value::Value;
use mrya_macros::native;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[native(module = "http", name = "get")]
pub fn get(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("get", args, 1)?;
    let url = arg_str("get", args, 0)?;

    let response = ureq::get(url)
        .timeout(REQUEST_TIMEOUT)
        .call()
        .map_err(|err| NativeError::msg(format!("http.get: {err}")))?;
    response
        .into_string()
        .map(Value::Str)
        .map_err(|err| NativeError::msg(format!("http.get: {err}")))
}

#[native(module = "http", name = "post")]
pub fn post(args: &[Value]) -> Result<Value, NativeError> {
    check_arity("post", args, 2)?;
    let url = arg_str("post", args, 0)?;
    let body = args[1].to_string();

    let response = ureq::post(url)
        .timeout(REQUEST_TIMEOUT)
        .send_string(&body)
        .map_err(|err| NativeError::msg(format!("http.post: {err}")))?;
    response
        .into_string()
        .map(Value::Str)
        .map_err(|err| NativeError::msg(format!("http.post: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_requires_string_url() {
        assert!(get(&[Value::Int(1)]).is_err());
        assert!(get(&[]).is_err());
    }

    #[test]
    fn test_invalid_url_is_an_error() {
        assert!(get(&[Value::Str("not a url".into())]).is_err());
    }
}

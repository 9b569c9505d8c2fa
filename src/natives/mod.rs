//! # Native Module Facade
//!
//! Host functions injected into the interpreter, organized by module:
//!
//! - **[builtins]**: conversions, `length`, `request`, `raise`/`assert`,
//!   `import`, file fetch/store, and the list/map helper commands, bound
//!   directly into the global environment
//! - **[math]**: arithmetic helpers, rounding, roots, randomness, trig
//! - **[strings]**: string manipulation, also exposed as string properties
//! - **[time]**: clocks, sleeping, and date formatting
//! - **[fs]**: filesystem queries relative to the loading directory
//! - **[json]**: JSON encode/decode
//! - **[http]**: HTTP client requests
//!
//! Functions are declared with the `#[native]` attribute, which submits an
//! [`NativeSpec`] through `inventory`; the interpreter collects every spec
//! at startup, so adding a native never touches the evaluator.

use crate::env::Environment;
use crate::error::NativeError;
use crate::eval::Interpreter;
use crate::value::{ListRef, MapRef, ModuleObj, NativeCall, NativeValue, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub mod builtins;
pub mod fs;
pub mod http;
pub mod json;
pub mod math;
pub mod strings;
pub mod time;

/// The two registrable calling conventions. The third convention
/// (receiver-bound) is produced on the fly by [`string_method`].
#[derive(Clone, Copy)]
pub enum NativeKind {
    Pure(fn(&[Value]) -> Result<Value, NativeError>),
    Interp(fn(&mut Interpreter, &[Value]) -> Result<Value, NativeError>),
}

/// One registered native function, collected at link time.
pub struct NativeSpec {
    pub module: &'static str,
    pub name: &'static str,
    pub kind: NativeKind,
}

inventory::collect!(NativeSpec);

fn native_value(spec: &NativeSpec) -> Value {
    Value::Native(NativeValue {
        name: spec.name.to_string(),
        call: match spec.kind {
            NativeKind::Pure(f) => NativeCall::Pure(f),
            NativeKind::Interp(f) => NativeCall::Interp(f),
        },
    })
}

/// Binds every `builtins`-module native directly into the environment.
pub fn install_globals(env: &Rc<Environment>) {
    for spec in inventory::iter::<NativeSpec> {
        if spec.module == "builtins" {
            env.define(spec.name, native_value(spec));
            if spec.name == "request" {
                // `input` is an alias for `request`
                env.define("input", native_value(spec));
            }
        }
    }
}

/// Assembles the importable native modules from the registry.
pub fn native_modules() -> HashMap<&'static str, Value> {
    let mut modules: HashMap<&'static str, Rc<ModuleObj>> = HashMap::new();
    for spec in inventory::iter::<NativeSpec> {
        if spec.module == "builtins" {
            continue;
        }
        let module = modules.entry(spec.module).or_insert_with(|| {
            Rc::new(ModuleObj {
                name: spec.module.to_string(),
                exports: RefCell::new(HashMap::new()),
            })
        });
        module
            .exports
            .borrow_mut()
            .insert(spec.name.to_string(), native_value(spec));
    }

    if let Some(math) = modules.get("math") {
        math.exports
            .borrow_mut()
            .insert("pi".to_string(), Value::Float(std::f64::consts::PI));
    }

    modules
        .into_iter()
        .map(|(name, module)| (name, Value::Module(module)))
        .collect()
}

/// Builds a receiver-bound callable for string property access: the
/// returned native prepends the receiver string to its arguments.
pub fn string_method(receiver: &str, name: &str) -> Option<Value> {
    for spec in inventory::iter::<NativeSpec> {
        if spec.module == "string" && spec.name == name {
            if let NativeKind::Pure(f) = spec.kind {
                let receiver = Value::Str(receiver.to_string());
                let label = format!("string.{name}");
                return Some(Value::Native(NativeValue {
                    name: label,
                    call: NativeCall::Bound(Rc::new(move |args: &[Value]| {
                        let mut full = Vec::with_capacity(args.len() + 1);
                        full.push(receiver.clone());
                        full.extend_from_slice(args);
                        f(&full)
                    })),
                }));
            }
        }
    }
    None
}

// --- Argument helpers shared by the native modules ---

pub fn check_arity(function: &str, args: &[Value], expected: usize) -> Result<(), NativeError> {
    if args.len() != expected {
        let plural = if expected == 1 { "" } else { "s" };
        return Err(NativeError::msg(format!(
            "{function}: expected {expected} argument{plural}, got {}",
            args.len()
        )));
    }
    Ok(())
}

pub fn check_arity_range(
    function: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<(), NativeError> {
    if args.len() < min || args.len() > max {
        return Err(NativeError::msg(format!(
            "{function}: expected {min}-{max} arguments, got {}",
            args.len()
        )));
    }
    Ok(())
}

fn type_error(function: &str, expected: &str, actual: &Value, position: usize) -> NativeError {
    NativeError::msg(format!(
        "{function}: expected {expected}, got {} at argument {position}",
        actual.type_name()
    ))
}

pub fn arg_str<'a>(
    function: &str,
    args: &'a [Value],
    index: usize,
) -> Result<&'a str, NativeError> {
    match &args[index] {
        Value::Str(s) => Ok(s),
        other => Err(type_error(function, "string", other, index + 1)),
    }
}

pub fn arg_num(function: &str, args: &[Value], index: usize) -> Result<f64, NativeError> {
    args[index]
        .as_f64()
        .ok_or_else(|| type_error(function, "number", &args[index], index + 1))
}

/// Accepts an int, or a float with no fractional part.
pub fn arg_int(function: &str, args: &[Value], index: usize) -> Result<i64, NativeError> {
    match &args[index] {
        Value::Int(i) => Ok(*i),
        Value::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
        other => Err(type_error(function, "integer", other, index + 1)),
    }
}

pub fn arg_list(function: &str, args: &[Value], index: usize) -> Result<ListRef, NativeError> {
    match &args[index] {
        Value::List(items) => Ok(items.clone()),
        other => Err(type_error(function, "list", other, index + 1)),
    }
}

pub fn arg_map(function: &str, args: &[Value], index: usize) -> Result<MapRef, NativeError> {
    match &args[index] {
        Value::Map(entries) => Ok(entries.clone()),
        other => Err(type_error(function, "map", other, index + 1)),
    }
}

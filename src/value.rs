// ABOUTME: Runtime value representation for the Mrya interpreter

use crate::ast::FunctionDecl;
use crate::env::Environment;
use crate::error::NativeError;
use crate::eval::Interpreter;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type MapRef = Rc<RefCell<HashMap<MapKey, Value>>>;

/// A map key: strings, ints, and floats. Float keys with no fractional part
/// normalize to ints so `m[1]` and `m[1.0]` address the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Str(String),
    Int(i64),
    Float(u64),
}

impl MapKey {
    pub fn from_value(value: &Value) -> Option<MapKey> {
        match value {
            Value::Str(s) => Some(MapKey::Str(s.clone())),
            Value::Int(i) => Some(MapKey::Int(*i)),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() && (i64::MIN as f64..=i64::MAX as f64).contains(f) {
                    Some(MapKey::Int(*f as i64))
                } else {
                    Some(MapKey::Float(f.to_bits()))
                }
            }
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Str(s) => Value::Str(s.clone()),
            MapKey::Int(i) => Value::Int(*i),
            MapKey::Float(bits) => Value::Float(f64::from_bits(*bits)),
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Str(s) => write!(f, "{s}"),
            MapKey::Int(i) => write!(f, "{i}"),
            MapKey::Float(bits) => write!(f, "{}", format_float(f64::from_bits(*bits))),
        }
    }
}

/// A user function value: the shared declaration plus the environment
/// captured at its definition site.
pub struct FunctionObj {
    pub decl: Rc<FunctionDecl>,
    pub closure: Rc<Environment>,
}

impl fmt::Debug for FunctionObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<func {}>", self.decl.name.lexeme)
    }
}

/// A method looked up on an instance, with `this` already determined and
/// the class whose table the declaration was found in (for `inherit`).
pub struct BoundMethodObj {
    pub receiver: Rc<InstanceObj>,
    pub function: Rc<FunctionObj>,
    pub defining_class: Rc<ClassObj>,
}

impl fmt::Debug for BoundMethodObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<bound method {}.{}>",
            self.receiver.class.name, self.function.decl.name.lexeme
        )
    }
}

/// A class: directly-declared methods plus any statics assigned later,
/// stored by name in one member table.
pub struct ClassObj {
    pub name: String,
    pub superclass: Option<Rc<ClassObj>>,
    pub members: RefCell<HashMap<String, Value>>,
}

impl ClassObj {
    /// Walk this class then its superclass chain; returns the member and
    /// the class whose table it was found in.
    pub fn find_member(self: &Rc<Self>, name: &str) -> Option<(Value, Rc<ClassObj>)> {
        if let Some(value) = self.members.borrow().get(name) {
            return Some((value.clone(), self.clone()));
        }
        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_member(name))
    }

    /// Find a member that is a method, as `(function, defining class)`.
    pub fn find_method(self: &Rc<Self>, name: &str) -> Option<(Rc<FunctionObj>, Rc<ClassObj>)> {
        match self.find_member(name) {
            Some((Value::Function(func), defining)) => Some((func, defining)),
            _ => None,
        }
    }
}

impl fmt::Debug for ClassObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

pub struct InstanceObj {
    pub class: Rc<ClassObj>,
    pub fields: RefCell<HashMap<String, Value>>,
}

impl fmt::Debug for InstanceObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<instance of {}>", self.class.name)
    }
}

/// A loaded module: a name and its exported bindings. The exports fill in
/// after execution, so an in-progress module can already circulate during
/// cyclic imports.
pub struct ModuleObj {
    pub name: String,
    pub exports: RefCell<HashMap<String, Value>>,
}

impl fmt::Debug for ModuleObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<module {}>", self.name)
    }
}

/// The three native calling conventions.
#[derive(Clone)]
pub enum NativeCall {
    /// Called with evaluated arguments only.
    Pure(fn(&[Value]) -> Result<Value, NativeError>),
    /// Receives the interpreter: for natives that load modules, call back
    /// into user code, or resolve paths against the loading directory.
    Interp(fn(&mut Interpreter, &[Value]) -> Result<Value, NativeError>),
    /// A one-argument-shifted closure with the receiver pre-filled, built
    /// on the fly for string property access.
    Bound(Rc<dyn Fn(&[Value]) -> Result<Value, NativeError>>),
}

#[derive(Clone)]
pub struct NativeValue {
    pub name: String,
    pub call: NativeCall,
}

impl fmt::Debug for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(ListRef),
    Map(MapRef),
    Function(Rc<FunctionObj>),
    BoundMethod(Rc<BoundMethodObj>),
    Class(Rc<ClassObj>),
    Instance(Rc<InstanceObj>),
    Module(Rc<ModuleObj>),
    Native(NativeValue),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Function(_) | Value::BoundMethod(_) => "function",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
            Value::Module(_) => "module",
            Value::Native(_) => "function",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Map(entries) => !entries.borrow().is_empty(),
            _ => true,
        }
    }

    /// Reference-typed values share their box when aliased by a plain
    /// variable-to-variable `let`; value types copy.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Value::List(_)
                | Value::Map(_)
                | Value::Function(_)
                | Value::BoundMethod(_)
                | Value::Class(_)
                | Value::Instance(_)
                | Value::Module(_)
                | Value::Native(_)
        )
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Quoted form used inside list and map displays.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('"');
                for c in s.chars() {
                    match c {
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        _ => out.push(c),
                    }
                }
                out.push('"');
                out
            }
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::BoundMethod(a), Value::BoundMethod(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a.name == b.name,
            _ => false,
        }
    }
}

/// Floats always display with a fractional part so they stay visually
/// distinct from ints.
pub fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item.repr())?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", MapKey::to_value(key).repr(), value.repr())?;
                }
                write!(f, "}}")
            }
            Value::Function(func) => write!(f, "<func {}>", func.decl.name.lexeme),
            Value::BoundMethod(bm) => write!(
                f,
                "<bound method {}.{}>",
                bm.receiver.class.name, bm.function.decl.name.lexeme
            ),
            Value::Class(class) => write!(f, "<class {}>", class.name),
            Value::Instance(instance) => write!(f, "<instance of {}>", instance.class.name),
            Value::Module(module) => write!(f, "<module {}>", module.name),
            Value::Native(native) => write!(f, "<native fn {}>", native.name),
        }
    }
}

/// Build a list value from elements.
pub fn list_value(items: Vec<Value>) -> Value {
    Value::List(Rc::new(RefCell::new(items)))
}

/// Build a map value from entries.
pub fn map_value(entries: HashMap<MapKey, Value>) -> Value {
    Value::Map(Rc::new(RefCell::new(entries)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_display() {
        assert_eq!(format!("{}", Value::Int(42)), "42");
        assert_eq!(format!("{}", Value::Int(-7)), "-7");
    }

    #[test]
    fn test_float_display_keeps_fraction() {
        assert_eq!(format!("{}", Value::Float(3.0)), "3.0");
        assert_eq!(format!("{}", Value::Float(-2.5)), "-2.5");
    }

    #[test]
    fn test_string_display_is_bare() {
        assert_eq!(format!("{}", Value::Str("hello".into())), "hello");
    }

    #[test]
    fn test_list_display_quotes_strings() {
        let list = list_value(vec![Value::Int(1), Value::Str("a".into()), Value::Nil]);
        assert_eq!(format!("{list}"), "[1, \"a\", nil]");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!list_value(vec![]).is_truthy());
        assert!(Value::Int(1).is_truthy());
        assert!(Value::Str("x".into()).is_truthy());
    }

    #[test]
    fn test_numeric_equality_crosses_int_float() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Int(1), Value::Float(1.5));
    }

    #[test]
    fn test_list_equality_is_deep() {
        let a = list_value(vec![Value::Int(1), Value::Int(2)]);
        let b = list_value(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_whole_float_keys_normalize_to_int() {
        assert_eq!(
            MapKey::from_value(&Value::Float(1.0)),
            Some(MapKey::Int(1))
        );
        assert_eq!(MapKey::from_value(&Value::Int(1)), Some(MapKey::Int(1)));
        assert!(matches!(
            MapKey::from_value(&Value::Float(1.5)),
            Some(MapKey::Float(_))
        ));
        assert_eq!(MapKey::from_value(&Value::Nil), None);
    }
}

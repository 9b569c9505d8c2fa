// ABOUTME: Lexically nested scopes and boxed variable bindings

use crate::error::MryaError;
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Runtime type tags checkable at binding and assignment time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Int,
    Float,
    Str,
    Bool,
    List,
    Map,
}

impl TypeTag {
    pub fn from_name(name: &str) -> Option<TypeTag> {
        let tag = match name {
            "int" => TypeTag::Int,
            "float" => TypeTag::Float,
            "string" => TypeTag::Str,
            "bool" => TypeTag::Bool,
            "list" => TypeTag::List,
            "map" => TypeTag::Map,
            _ => return None,
        };
        Some(tag)
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Str => "string",
            TypeTag::Bool => "bool",
            TypeTag::List => "list",
            TypeTag::Map => "map",
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (TypeTag::Int, Value::Int(_))
                | (TypeTag::Float, Value::Float(_))
                | (TypeTag::Str, Value::Str(_))
                | (TypeTag::Bool, Value::Bool(_))
                | (TypeTag::List, Value::List(_))
                | (TypeTag::Map, Value::Map(_))
        )
    }
}

/// A mutable storage cell for one named binding: the value plus the
/// binding's const flag and optional type annotation. Aliased bindings
/// share the same box.
#[derive(Debug)]
pub struct Binding {
    pub value: RefCell<Value>,
    pub is_const: bool,
    pub type_tag: Option<TypeTag>,
}

impl Binding {
    pub fn new(value: Value, is_const: bool, type_tag: Option<TypeTag>) -> Rc<Self> {
        Rc::new(Binding {
            value: RefCell::new(value),
            is_const,
            type_tag,
        })
    }
}

pub struct Environment {
    values: RefCell<HashMap<String, Rc<Binding>>>,
    enclosing: Option<Rc<Environment>>,
}

impl Environment {
    /// Creates a new global environment with no parent.
    pub fn new() -> Rc<Self> {
        Rc::new(Environment {
            values: RefCell::new(HashMap::new()),
            enclosing: None,
        })
    }

    /// Creates a new child environment with an enclosing scope.
    pub fn with_enclosing(enclosing: Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            values: RefCell::new(HashMap::new()),
            enclosing: Some(enclosing),
        })
    }

    /// Defines a plain mutable binding in THIS scope.
    pub fn define(&self, name: &str, value: Value) {
        self.define_binding(name, Binding::new(value, false, None));
    }

    pub fn define_const(&self, name: &str, value: Value) {
        self.define_binding(name, Binding::new(value, true, None));
    }

    /// Defines a binding box directly (used for box-sharing aliases).
    pub fn define_binding(&self, name: &str, binding: Rc<Binding>) {
        self.values.borrow_mut().insert(name.to_string(), binding);
    }

    /// Looks up a name in this scope and enclosing scopes.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(binding) = self.values.borrow().get(name) {
            return Some(binding.value.borrow().clone());
        }
        self.enclosing.as_ref().and_then(|parent| parent.get(name))
    }

    /// Looks up the binding box itself, for aliasing at binding sites.
    pub fn get_binding(&self, name: &str) -> Option<Rc<Binding>> {
        if let Some(binding) = self.values.borrow().get(name) {
            return Some(binding.clone());
        }
        self.enclosing
            .as_ref()
            .and_then(|parent| parent.get_binding(name))
    }

    /// Assigns to the nearest enclosing binding bearing the name, honoring
    /// const and type-annotation metadata.
    pub fn assign(&self, name_token: &Token, value: Value) -> Result<(), MryaError> {
        let name = &name_token.lexeme;
        let binding = {
            let values = self.values.borrow();
            values.get(name.as_str()).cloned()
        };
        if let Some(binding) = binding {
            if binding.is_const {
                return Err(MryaError::runtime(
                    name_token,
                    format!("Cannot assign to constant variable '{name}'."),
                ));
            }
            if let Some(tag) = binding.type_tag {
                if !tag.matches(&value) {
                    return Err(MryaError::TypeMismatch {
                        token: name_token.clone(),
                        message: format!(
                            "Type mismatch for '{name}'. Expected '{}', but got value of type '{}'.",
                            tag.name(),
                            value.type_name()
                        ),
                    });
                }
            }
            *binding.value.borrow_mut() = value;
            return Ok(());
        }

        match &self.enclosing {
            Some(parent) => parent.assign(name_token, value),
            None => Err(MryaError::runtime(
                name_token,
                format!("Cannot assign to undefined variable '{name}'."),
            )),
        }
    }

    /// The bindings defined directly in this scope, for module export
    /// population.
    pub fn local_bindings(&self) -> Vec<(String, Value)> {
        self.values
            .borrow()
            .iter()
            .map(|(name, binding)| (name.clone(), binding.value.borrow().clone()))
            .collect()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Bindings may close back over this environment; print names only.
        let names: Vec<String> = self.values.borrow().keys().cloned().collect();
        f.debug_struct("Environment")
            .field("names", &names)
            .field("has_enclosing", &self.enclosing.is_some())
            .finish()
    }
}

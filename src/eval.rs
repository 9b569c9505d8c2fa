// ABOUTME: Statement executor and expression evaluator for Mrya

use crate::ast::{Expr, HStringPart, LiteralExpr, Stmt};
use crate::config;
use crate::env::{Binding, Environment, TypeTag};
use crate::error::{Flow, MryaError};
use crate::lexer::Lexer;
use crate::natives;
use crate::parser::Parser;
use crate::token::{Token, TokenKind};
use crate::value::{
    list_value, ClassObj, FunctionObj, InstanceObj, MapKey, NativeCall, Value,
};
use crate::value::BoundMethodObj;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// The tree-walking evaluator. Holds the global environment, the module
/// loader state, and the output sink. The evaluator is single-threaded;
/// one instance must never be driven from two threads.
pub struct Interpreter {
    pub globals: Rc<Environment>,
    pub(crate) module_cache: HashMap<PathBuf, Value>,
    pub(crate) dir_stack: Vec<PathBuf>,
    pub(crate) install_root: PathBuf,
    pub(crate) native_modules: HashMap<&'static str, Value>,
    capture: Option<Rc<RefCell<String>>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let globals = Environment::new();
        natives::install_globals(&globals);
        Interpreter {
            globals,
            module_cache: HashMap::new(),
            dir_stack: Vec::new(),
            install_root: config::install_root(),
            native_modules: natives::native_modules(),
            capture: None,
        }
    }

    /// An interpreter whose `output` goes to a buffer instead of stdout.
    pub fn with_capture(buffer: Rc<RefCell<String>>) -> Self {
        let mut interp = Self::new();
        interp.capture = Some(buffer);
        interp
    }

    pub fn set_install_root(&mut self, root: PathBuf) {
        self.install_root = root;
    }

    /// Lex, parse, and execute a source text. `path` is the source file,
    /// used to anchor relative imports; `None` anchors them at the current
    /// directory (REPL behavior).
    pub fn run(&mut self, source: &str, path: Option<&Path>) -> Result<(), MryaError> {
        let tokens = Lexer::new(source).scan_tokens()?;
        let statements = Parser::new(tokens).parse()?;
        let base_dir = path
            .and_then(|p| p.parent())
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        self.execute_program(&statements, base_dir)
    }

    /// Executes an already-parsed program against the global environment.
    pub fn execute_program(
        &mut self,
        statements: &[Stmt],
        base_dir: PathBuf,
    ) -> Result<(), MryaError> {
        self.dir_stack.push(base_dir);
        let globals = self.globals.clone();
        let result = self.execute_block(statements, &globals);
        self.dir_stack.pop();
        match result {
            // A top-level return simply stops the script
            Ok(()) | Err(Flow::Return(_)) => Ok(()),
            Err(Flow::Error(err)) => Err(err),
            Err(Flow::Break) | Err(Flow::Continue) => {
                Err(MryaError::runtime_bare("Loop control outside of a loop."))
            }
        }
    }

    /// The directory imports and file natives resolve relative paths
    /// against: the directory of the file currently being executed.
    pub fn current_dir(&self) -> PathBuf {
        self.dir_stack
            .last()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.current_dir().join(p)
        }
    }

    fn write_out(&mut self, text: &str) {
        match &self.capture {
            Some(buffer) => {
                let mut buffer = buffer.borrow_mut();
                buffer.push_str(text);
                buffer.push('\n');
            }
            None => println!("{text}"),
        }
    }

    // --- Statement execution ---

    pub(crate) fn execute_block(
        &mut self,
        statements: &[Stmt],
        env: &Rc<Environment>,
    ) -> Result<(), Flow> {
        for statement in statements {
            self.execute(statement, env)?;
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt, env: &Rc<Environment>) -> Result<(), Flow> {
        match stmt {
            Stmt::Let {
                name,
                initializer,
                is_const,
                type_annotation,
            } => self.execute_let(name, initializer, *is_const, type_annotation, env),

            Stmt::Output { keyword, expr } => {
                let value = self.evaluate(expr, env)?;
                // Suppress nil so bare side-effect calls stay silent
                if !matches!(value, Value::Nil) {
                    let text = self.stringify(&value, keyword)?;
                    self.write_out(&text);
                }
                Ok(())
            }

            Stmt::Assignment { name, value } => {
                let value = self.evaluate(value, env)?;
                env.assign(name, value).map_err(Flow::Error)
            }

            Stmt::SubscriptSet {
                object,
                index,
                bracket,
                value,
            } => self.execute_subscript_set(object, index, bracket, value, env),

            Stmt::SetProperty {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object, env)?;
                let value = self.evaluate(value, env)?;
                match object {
                    Value::Instance(instance) => {
                        instance
                            .fields
                            .borrow_mut()
                            .insert(name.lexeme.clone(), value);
                        Ok(())
                    }
                    // Assigning through a class stores a static attribute
                    Value::Class(class) => {
                        class.members.borrow_mut().insert(name.lexeme.clone(), value);
                        Ok(())
                    }
                    other => Err(Flow::Error(MryaError::runtime(
                        name,
                        format!(
                            "Only instances and classes have assignable properties. Got {}.",
                            other.type_name()
                        ),
                    ))),
                }
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition, env)?.is_truthy() {
                    self.execute_block(then_branch, env)
                } else if let Some(else_branch) = else_branch {
                    self.execute_block(else_branch, env)
                } else {
                    Ok(())
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition, env)?.is_truthy() {
                    match self.execute_block(body, env) {
                        Ok(()) | Err(Flow::Continue) => {}
                        Err(Flow::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(())
            }

            Stmt::For {
                variable,
                iterable,
                body,
            } => self.execute_for(variable, iterable, body, env),

            Stmt::Break(_) => Err(Flow::Break),
            Stmt::Continue(_) => Err(Flow::Continue),

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::Nil,
                };
                Err(Flow::Return(value))
            }

            Stmt::Try {
                body,
                catches,
                finally,
            } => {
                let mut outcome = self.execute_block(body, env);

                let raised = match &outcome {
                    Err(Flow::Error(err)) => Some(err.clone()),
                    _ => None,
                };
                if let Some(err) = raised {
                    for clause in catches {
                        let matched = match &clause.kind {
                            None => true,
                            Some(kind) => kind.lexeme == err.kind_name(),
                        };
                        if matched {
                            // Each catch body runs in its own scope
                            let catch_env = Environment::with_enclosing(env.clone());
                            outcome = self.execute_block(&clause.body, &catch_env);
                            break;
                        }
                    }
                }

                if let Some(finally) = finally {
                    let finished = self.execute_block(finally, env);
                    // A signal out of the finalizer supersedes the in-flight one
                    if finished.is_err() {
                        outcome = finished;
                    }
                }

                outcome
            }

            Stmt::Function(decl) => {
                let function = Value::Function(Rc::new(FunctionObj {
                    decl: decl.clone(),
                    closure: env.clone(),
                }));
                let value = self.apply_decorators(&decl.decorators, function, env, &decl.name)?;
                env.define_const(&decl.name.lexeme, value);
                Ok(())
            }

            Stmt::Class {
                name,
                superclass,
                methods,
                decorators,
            } => {
                let superclass = match superclass {
                    Some(expr) => match self.evaluate(expr, env)? {
                        Value::Class(class) => Some(class),
                        other => {
                            return Err(Flow::Error(MryaError::runtime(
                                name,
                                format!("Superclass must be a class. Got {}.", other.type_name()),
                            )));
                        }
                    },
                    None => None,
                };

                let class = Rc::new(ClassObj {
                    name: name.lexeme.clone(),
                    superclass,
                    members: RefCell::new(HashMap::new()),
                });

                for method in methods {
                    let function = Value::Function(Rc::new(FunctionObj {
                        decl: method.clone(),
                        closure: env.clone(),
                    }));
                    class
                        .members
                        .borrow_mut()
                        .insert(method.name.lexeme.clone(), function);
                }

                let value = self.apply_decorators(decorators, Value::Class(class), env, name)?;
                env.define_const(&name.lexeme, value);
                Ok(())
            }

            Stmt::Import { keyword, path } => {
                let path = match self.evaluate(path, env)? {
                    Value::Str(path) => path,
                    other => {
                        return Err(Flow::Error(MryaError::runtime(
                            keyword,
                            format!("Import path must be a string. Got {}.", other.type_name()),
                        )));
                    }
                };
                let module = self
                    .load_module(&path, Some(keyword))
                    .map_err(Flow::Error)?;
                let name = crate::loader::binding_name(&path);
                env.define(&name, module);
                Ok(())
            }

            Stmt::Expression(expr) => {
                self.evaluate(expr, env)?;
                Ok(())
            }
        }
    }

    fn execute_let(
        &mut self,
        name: &Token,
        initializer: &Expr,
        is_const: bool,
        type_annotation: &Option<Token>,
        env: &Rc<Environment>,
    ) -> Result<(), Flow> {
        let tag = match type_annotation {
            Some(tag_token) => Some(TypeTag::from_name(&tag_token.lexeme).ok_or_else(|| {
                Flow::Error(MryaError::TypeMismatch {
                    token: tag_token.clone(),
                    message: format!("Unknown type '{}'.", tag_token.lexeme),
                })
            })?),
            None => None,
        };

        // A plain variable initializer holding a reference type aliases
        // the source box; everything else gets a fresh box.
        if !is_const && tag.is_none() {
            if let Expr::Variable(source) = initializer {
                if let Some(binding) = env.get_binding(&source.lexeme) {
                    if binding.value.borrow().is_reference() {
                        env.define_binding(&name.lexeme, binding);
                        return Ok(());
                    }
                }
            }
        }

        let value = self.evaluate(initializer, env)?;
        if let Some(tag) = tag {
            if !tag.matches(&value) {
                let tag_token = type_annotation.as_ref().expect("tag implies annotation");
                return Err(Flow::Error(MryaError::TypeMismatch {
                    token: tag_token.clone(),
                    message: format!(
                        "Type mismatch for '{}'. Expected '{}', but got value of type '{}'.",
                        name.lexeme,
                        tag.name(),
                        value.type_name()
                    ),
                }));
            }
        }
        env.define_binding(&name.lexeme, Binding::new(value, is_const, tag));
        Ok(())
    }

    fn execute_for(
        &mut self,
        variable: &Token,
        iterable: &Expr,
        body: &[Stmt],
        env: &Rc<Environment>,
    ) -> Result<(), Flow> {
        let iterable = self.evaluate(iterable, env)?;
        match iterable {
            Value::List(items) => {
                let mut index = 0;
                loop {
                    // Index-based so user mutation of the list mid-loop is safe
                    let item = {
                        let items = items.borrow();
                        if index >= items.len() {
                            break;
                        }
                        items[index].clone()
                    };
                    index += 1;

                    match self.run_iteration(variable, item, body, env) {
                        Ok(()) | Err(Flow::Continue) => {}
                        Err(Flow::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(())
            }
            Value::Str(text) => {
                for c in text.chars() {
                    match self.run_iteration(variable, Value::Str(c.to_string()), body, env) {
                        Ok(()) | Err(Flow::Continue) => {}
                        Err(Flow::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(())
            }
            other => Err(Flow::Error(MryaError::runtime(
                variable,
                format!(
                    "For loop can only iterate over lists and strings. Got {}.",
                    other.type_name()
                ),
            ))),
        }
    }

    /// Each iteration gets a fresh scope holding the loop variable, so
    /// closures made in the body capture per-iteration bindings.
    fn run_iteration(
        &mut self,
        variable: &Token,
        item: Value,
        body: &[Stmt],
        env: &Rc<Environment>,
    ) -> Result<(), Flow> {
        let loop_env = Environment::with_enclosing(env.clone());
        loop_env.define(&variable.lexeme, item);
        self.execute_block(body, &loop_env)
    }

    fn execute_subscript_set(
        &mut self,
        object: &Expr,
        index: &Expr,
        bracket: &Token,
        value: &Expr,
        env: &Rc<Environment>,
    ) -> Result<(), Flow> {
        let object = self.evaluate(object, env)?;
        let index = self.evaluate(index, env)?;
        let value = self.evaluate(value, env)?;

        match object {
            Value::List(items) => {
                let raw = match index {
                    Value::Int(i) => i,
                    _ => {
                        return Err(Flow::Error(MryaError::runtime(
                            bracket,
                            "List index must be an integer.",
                        )));
                    }
                };
                let len = items.borrow().len();
                let resolved = resolve_index(raw, len).ok_or_else(|| {
                    Flow::Error(MryaError::runtime(
                        bracket,
                        format!("List index {raw} out of range."),
                    ))
                })?;
                items.borrow_mut()[resolved] = value;
                Ok(())
            }
            Value::Map(entries) => {
                let key = MapKey::from_value(&index).ok_or_else(|| {
                    Flow::Error(MryaError::runtime(
                        bracket,
                        "Map keys must be strings or numbers.",
                    ))
                })?;
                entries.borrow_mut().insert(key, value);
                Ok(())
            }
            Value::Instance(instance) => {
                match instance.class.find_method("_set_") {
                    Some((function, defining)) => {
                        self.call_function(
                            &function,
                            Some((instance.clone(), defining)),
                            vec![index, value],
                            bracket,
                        )?;
                        Ok(())
                    }
                    None => Err(Flow::Error(MryaError::class_function(
                        bracket,
                        format!(
                            "Class '{}' does not define '_set_' required for subscript assignment.",
                            instance.class.name
                        ),
                    ))),
                }
            }
            other => Err(Flow::Error(MryaError::runtime(
                bracket,
                format!(
                    "Can only set items on lists, maps, and instances. Got {}.",
                    other.type_name()
                ),
            ))),
        }
    }

    /// Folds decorators over a declared value, bottom-up: the decorator
    /// written closest to the declaration applies first.
    fn apply_decorators(
        &mut self,
        decorators: &[Expr],
        mut value: Value,
        env: &Rc<Environment>,
        name: &Token,
    ) -> Result<Value, Flow> {
        for decorator in decorators.iter().rev() {
            let callable = self.evaluate(decorator, env)?;
            value = self.call_value(callable, vec![value], name)?;
        }
        Ok(value)
    }

    // --- Expression evaluation ---

    pub(crate) fn evaluate(&mut self, expr: &Expr, env: &Rc<Environment>) -> Result<Value, Flow> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralExpr::Nil => Value::Nil,
                LiteralExpr::Bool(b) => Value::Bool(*b),
                LiteralExpr::Int(i) => Value::Int(*i),
                LiteralExpr::Float(f) => Value::Float(*f),
                LiteralExpr::Str(s) => Value::Str(s.clone()),
            }),

            Expr::Variable(name) => env.get(&name.lexeme).ok_or_else(|| {
                Flow::Error(MryaError::runtime(
                    name,
                    format!("Variable '{}' is not defined.", name.lexeme),
                ))
            }),

            Expr::ListLiteral(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.evaluate(element, env)?);
                }
                Ok(list_value(items))
            }

            Expr::MapLiteral { brace, pairs } => {
                let mut entries = HashMap::with_capacity(pairs.len());
                for (key_expr, value_expr) in pairs {
                    let key = self.evaluate(key_expr, env)?;
                    let value = self.evaluate(value_expr, env)?;
                    let key = MapKey::from_value(&key).ok_or_else(|| {
                        Flow::Error(MryaError::runtime(
                            brace,
                            format!(
                                "Map keys must be strings or numbers. Got {}.",
                                key.type_name()
                            ),
                        ))
                    })?;
                    entries.insert(key, value);
                }
                Ok(crate::value::map_value(entries))
            }

            Expr::HString { token, parts } => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        HStringPart::Literal(fragment) => text.push_str(fragment),
                        HStringPart::Expr(expr) => {
                            let value = self.evaluate(expr, env)?;
                            text.push_str(&self.stringify(&value, token)?);
                        }
                    }
                }
                Ok(Value::Str(text))
            }

            Expr::Unary { op, right } => {
                let right = self.evaluate(right, env)?;
                match op.kind {
                    TokenKind::Minus => match right {
                        Value::Int(i) => i
                            .checked_neg()
                            .map(Value::Int)
                            .ok_or_else(|| Flow::Error(MryaError::runtime(op, "Integer overflow."))),
                        Value::Float(f) => Ok(Value::Float(-f)),
                        other => Err(Flow::Error(MryaError::runtime(
                            op,
                            format!("Operand must be a number. Got {}.", other.type_name()),
                        ))),
                    },
                    _ => Ok(Value::Bool(!right.is_truthy())),
                }
            }

            Expr::Binary { left, op, right } => {
                let left = self.evaluate(left, env)?;
                let right = self.evaluate(right, env)?;
                self.binary_op(left, op, right)
            }

            Expr::Logical { left, op, right } => {
                let left = self.evaluate(left, env)?;
                if op.kind == TokenKind::Or {
                    if left.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                } else if !left.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.evaluate(right, env)?.is_truthy()))
            }

            Expr::Get { object, name } => self.evaluate_get(object, name, env),

            Expr::Subscript {
                object,
                index,
                bracket,
            } => self.evaluate_subscript(object, index, bracket, env),

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee, env)?;
                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    if let Expr::Splat { ellipsis, expr } = argument {
                        match self.evaluate(expr, env)? {
                            Value::List(items) => {
                                args.extend(items.borrow().iter().cloned());
                            }
                            other => {
                                return Err(Flow::Error(MryaError::runtime(
                                    ellipsis,
                                    format!(
                                        "Splat argument must be a list. Got {}.",
                                        other.type_name()
                                    ),
                                )));
                            }
                        }
                    } else {
                        args.push(self.evaluate(argument, env)?);
                    }
                }
                self.call_value(callee, args, paren)
            }

            Expr::Splat { ellipsis, .. } => Err(Flow::Error(MryaError::runtime(
                ellipsis,
                "Splat is only allowed in call arguments.",
            ))),

            Expr::This(keyword) => env.get("this").ok_or_else(|| {
                Flow::Error(MryaError::runtime(
                    keyword,
                    "Cannot use 'this' outside of a class method.",
                ))
            }),

            Expr::Inherit { keyword, method } => self.evaluate_inherit(keyword, method, env),
        }
    }

    fn evaluate_get(
        &mut self,
        object: &Expr,
        name: &Token,
        env: &Rc<Environment>,
    ) -> Result<Value, Flow> {
        let object = self.evaluate(object, env)?;
        match object {
            Value::Module(module) => {
                let value = module.exports.borrow().get(&name.lexeme).cloned();
                value.ok_or_else(|| {
                    Flow::Error(MryaError::runtime(
                        name,
                        format!(
                            "Module '{}' has no attribute '{}'.",
                            module.name, name.lexeme
                        ),
                    ))
                })
            }
            Value::Instance(instance) => {
                let field = instance.fields.borrow().get(&name.lexeme).cloned();
                if let Some(value) = field {
                    return Ok(value);
                }
                match instance.class.find_member(&name.lexeme) {
                    Some((Value::Function(function), defining)) => {
                        Ok(Value::BoundMethod(Rc::new(BoundMethodObj {
                            receiver: instance.clone(),
                            function,
                            defining_class: defining,
                        })))
                    }
                    Some((value, _)) => Ok(value),
                    None => Err(Flow::Error(MryaError::runtime(
                        name,
                        format!(
                            "Undefined property '{}' on instance of '{}'.",
                            name.lexeme, instance.class.name
                        ),
                    ))),
                }
            }
            Value::Class(class) => match class.find_member(&name.lexeme) {
                Some((value, _)) => Ok(value),
                None => Err(Flow::Error(MryaError::runtime(
                    name,
                    format!("Class '{}' has no attribute '{}'.", class.name, name.lexeme),
                ))),
            },
            // String properties come from the string native module with
            // the receiver pre-bound
            Value::Str(receiver) => {
                natives::string_method(&receiver, &name.lexeme).ok_or_else(|| {
                    Flow::Error(MryaError::runtime(
                        name,
                        format!("String has no method '{}'.", name.lexeme),
                    ))
                })
            }
            other => Err(Flow::Error(MryaError::runtime(
                name,
                format!(
                    "Only modules, classes, instances, and strings have properties. Got {}.",
                    other.type_name()
                ),
            ))),
        }
    }

    fn evaluate_subscript(
        &mut self,
        object: &Expr,
        index: &Expr,
        bracket: &Token,
        env: &Rc<Environment>,
    ) -> Result<Value, Flow> {
        let object = self.evaluate(object, env)?;
        let index = self.evaluate(index, env)?;

        match object {
            Value::List(items) => {
                let raw = match index {
                    Value::Int(i) => i,
                    _ => {
                        return Err(Flow::Error(MryaError::runtime(
                            bracket,
                            "List or string index must be an integer.",
                        )));
                    }
                };
                let items = items.borrow();
                let resolved = resolve_index(raw, items.len()).ok_or_else(|| {
                    Flow::Error(MryaError::runtime(
                        bracket,
                        format!("Index {raw} out of range."),
                    ))
                })?;
                Ok(items[resolved].clone())
            }
            Value::Str(text) => {
                let raw = match index {
                    Value::Int(i) => i,
                    _ => {
                        return Err(Flow::Error(MryaError::runtime(
                            bracket,
                            "List or string index must be an integer.",
                        )));
                    }
                };
                let chars: Vec<char> = text.chars().collect();
                let resolved = resolve_index(raw, chars.len()).ok_or_else(|| {
                    Flow::Error(MryaError::runtime(
                        bracket,
                        format!("Index {raw} out of range."),
                    ))
                })?;
                Ok(Value::Str(chars[resolved].to_string()))
            }
            Value::Map(entries) => {
                let key = MapKey::from_value(&index).ok_or_else(|| {
                    Flow::Error(MryaError::runtime(
                        bracket,
                        "Map key must be a string or number.",
                    ))
                })?;
                // Missing keys read as nil
                Ok(entries.borrow().get(&key).cloned().unwrap_or(Value::Nil))
            }
            Value::Instance(instance) => match instance.class.find_method("_get_") {
                Some((function, defining)) => self.call_function(
                    &function,
                    Some((instance.clone(), defining)),
                    vec![index],
                    bracket,
                ),
                None => Err(Flow::Error(MryaError::class_function(
                    bracket,
                    format!(
                        "Class '{}' does not define '_get_' required for subscript access.",
                        instance.class.name
                    ),
                ))),
            },
            other => Err(Flow::Error(MryaError::runtime(
                bracket,
                format!(
                    "Can only subscript lists, strings, maps, and instances. Got {}.",
                    other.type_name()
                ),
            ))),
        }
    }

    fn evaluate_inherit(
        &mut self,
        keyword: &Token,
        method: &Token,
        env: &Rc<Environment>,
    ) -> Result<Value, Flow> {
        let superclass = match env.get("inherit") {
            Some(Value::Class(class)) => class,
            _ => {
                return Err(Flow::Error(MryaError::runtime(
                    keyword,
                    "Cannot use 'inherit' outside of a subclass method.",
                )));
            }
        };
        let receiver = match env.get("this") {
            Some(Value::Instance(instance)) => instance,
            _ => {
                return Err(Flow::Error(MryaError::runtime(
                    keyword,
                    "Cannot use 'inherit' outside of a class method.",
                )));
            }
        };

        match superclass.find_member(&method.lexeme) {
            Some((Value::Function(function), defining)) => {
                Ok(Value::BoundMethod(Rc::new(BoundMethodObj {
                    receiver,
                    function,
                    defining_class: defining,
                })))
            }
            Some((value, _)) => Ok(value),
            None => Err(Flow::Error(MryaError::runtime(
                method,
                format!(
                    "Undefined method '{}' in superclass '{}'.",
                    method.lexeme, superclass.name
                ),
            ))),
        }
    }

    // --- Calls ---

    pub fn call_value(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        token: &Token,
    ) -> Result<Value, Flow> {
        match callee {
            Value::Function(function) => self.call_function(&function, None, args, token),
            Value::BoundMethod(method) => self.call_function(
                &method.function,
                Some((method.receiver.clone(), method.defining_class.clone())),
                args,
                token,
            ),
            Value::Class(class) => self.instantiate(&class, args, token),
            Value::Native(native) => {
                let result = match &native.call {
                    NativeCall::Pure(f) => f(&args),
                    NativeCall::Interp(f) => f(self, &args),
                    NativeCall::Bound(f) => f(&args),
                };
                result.map_err(|err| Flow::Error(err.into_error(token)))
            }
            Value::Module(module) => Err(Flow::Error(MryaError::runtime(
                token,
                format!(
                    "Module '{}' is not callable. Use 'return' at the top level of the module file to export a value.",
                    module.name
                ),
            ))),
            other => Err(Flow::Error(MryaError::runtime(
                token,
                format!(
                    "Can only call functions, classes, and native functions. Got {}.",
                    other.type_name()
                ),
            ))),
        }
    }

    /// Invokes a user function. `this_ctx` carries the receiver and the
    /// class that defined the method; the call environment encloses the
    /// function's captured closure, never the caller's environment.
    pub(crate) fn call_function(
        &mut self,
        function: &Rc<FunctionObj>,
        this_ctx: Option<(Rc<InstanceObj>, Rc<ClassObj>)>,
        args: Vec<Value>,
        token: &Token,
    ) -> Result<Value, Flow> {
        let decl = &function.decl;
        let call_env = Environment::with_enclosing(function.closure.clone());

        if let Some((receiver, defining_class)) = this_ctx {
            call_env.define("this", Value::Instance(receiver));
            if let Some(superclass) = &defining_class.superclass {
                call_env.define("inherit", Value::Class(superclass.clone()));
            }
        }

        if decl.is_variadic {
            let fixed = decl.params.len() - 1;
            if args.len() < fixed {
                return Err(Flow::Error(MryaError::runtime(
                    token,
                    format!(
                        "Function '{}' expects at least {} arguments, but got {}.",
                        decl.name.lexeme,
                        fixed,
                        args.len()
                    ),
                )));
            }
            let mut args = args;
            let rest = args.split_off(fixed);
            for (param, value) in decl.params[..fixed].iter().zip(args) {
                call_env.define(&param.lexeme, value);
            }
            call_env.define(&decl.params[fixed].lexeme, list_value(rest));
        } else {
            if args.len() != decl.params.len() {
                return Err(Flow::Error(MryaError::runtime(
                    token,
                    format!(
                        "Function '{}' expects {} arguments, but got {}.",
                        decl.name.lexeme,
                        decl.params.len(),
                        args.len()
                    ),
                )));
            }
            for (param, value) in decl.params.iter().zip(args) {
                call_env.define(&param.lexeme, value);
            }
        }

        match self.execute_block(&decl.body, &call_env) {
            Ok(()) => Ok(Value::Nil),
            Err(Flow::Return(value)) => Ok(value),
            Err(other) => Err(other),
        }
    }

    fn instantiate(
        &mut self,
        class: &Rc<ClassObj>,
        args: Vec<Value>,
        token: &Token,
    ) -> Result<Value, Flow> {
        let instance = Rc::new(InstanceObj {
            class: class.clone(),
            fields: RefCell::new(HashMap::new()),
        });

        if let Some((function, defining)) = class.find_method("_start_") {
            self.call_function(&function, Some((instance.clone(), defining)), args, token)?;
        } else if !args.is_empty() {
            return Err(Flow::Error(MryaError::runtime(
                token,
                format!(
                    "Class '{}' has no '_start_' method but was called with {} arguments.",
                    class.name,
                    args.len()
                ),
            )));
        }

        Ok(Value::Instance(instance))
    }

    /// Invokes a method on an instance on behalf of a native (e.g. `_len_`
    /// for `length()`), flattening control flow back to a plain error.
    pub fn call_instance_method(
        &mut self,
        instance: &Rc<InstanceObj>,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, MryaError> {
        let token = Token::synthetic(TokenKind::Identifier, name, 0);
        match instance.class.find_method(name) {
            Some((function, defining)) => {
                match self.call_function(&function, Some((instance.clone(), defining)), args, &token)
                {
                    Ok(value) => Ok(value),
                    Err(Flow::Error(err)) => Err(err),
                    Err(_) => Err(MryaError::runtime_bare(
                        "Unexpected loop control escaping a method call.",
                    )),
                }
            }
            None => Err(MryaError::ClassFunction {
                token: None,
                message: format!("Class '{}' does not define '{}'.", instance.class.name, name),
            }),
        }
    }

    // --- Operators ---

    fn binary_op(&mut self, left: Value, op: &Token, right: Value) -> Result<Value, Flow> {
        // Instances dispatch operators through their dunder methods
        if let Value::Instance(instance) = &left {
            if let Some(dunder) = dunder_for(op.kind) {
                let (function, defining) =
                    instance.class.find_method(dunder).ok_or_else(|| {
                        Flow::Error(MryaError::class_function(
                            op,
                            format!(
                                "Class '{}' does not define '{}' required for '{}'.",
                                instance.class.name, dunder, op.lexeme
                            ),
                        ))
                    })?;
                let result = self.call_function(
                    &function,
                    Some((instance.clone(), defining)),
                    vec![right],
                    op,
                )?;
                if op.kind == TokenKind::BangEqual {
                    return Ok(Value::Bool(!result.is_truthy()));
                }
                return Ok(result);
            }
        }

        match op.kind {
            TokenKind::Plus => self.add_values(left, op, right),
            TokenKind::Minus | TokenKind::Star => arithmetic(left, op, right),
            TokenKind::Slash => divide(left, op, right),
            TokenKind::EqualEqual => Ok(Value::Bool(left == right)),
            TokenKind::BangEqual => Ok(Value::Bool(left != right)),
            TokenKind::Greater | TokenKind::GreaterEqual | TokenKind::Less | TokenKind::LessEqual => {
                compare(left, op, right)
            }
            _ => Err(Flow::Error(MryaError::runtime(
                op,
                format!("Unsupported operator: {}", op.lexeme),
            ))),
        }
    }

    fn add_values(&mut self, left: Value, op: &Token, right: Value) -> Result<Value, Flow> {
        // Any string operand turns '+' into concatenation
        if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) {
            let mut text = self.stringify(&left, op)?;
            text.push_str(&self.stringify(&right, op)?);
            return Ok(Value::Str(text));
        }

        match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or_else(|| Flow::Error(MryaError::runtime(op, "Integer overflow."))),
            (Value::List(a), Value::List(b)) => {
                let mut items = a.borrow().clone();
                items.extend(b.borrow().iter().cloned());
                Ok(list_value(items))
            }
            _ => match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => Ok(Value::Float(a + b)),
                _ => Err(Flow::Error(invalid_operands(op, &left, &right))),
            },
        }
    }

    /// Stringification used by `output`, h-strings, and string
    /// concatenation: instances render through `_out_` when they have one.
    pub fn stringify(&mut self, value: &Value, token: &Token) -> Result<String, Flow> {
        if let Value::Instance(instance) = value {
            if let Some((function, defining)) = instance.class.find_method("_out_") {
                let rendered = self.call_function(
                    &function,
                    Some((instance.clone(), defining)),
                    vec![],
                    token,
                )?;
                return Ok(rendered.to_string());
            }
        }
        Ok(value.to_string())
    }
}

fn dunder_for(kind: TokenKind) -> Option<&'static str> {
    match kind {
        TokenKind::Plus => Some("_plus_"),
        TokenKind::Minus => Some("_minus_"),
        TokenKind::Star => Some("_times_"),
        TokenKind::Slash => Some("_divide_"),
        TokenKind::EqualEqual | TokenKind::BangEqual => Some("_equals_"),
        _ => None,
    }
}

/// Negative indices count from the end, Python-style.
fn resolve_index(raw: i64, len: usize) -> Option<usize> {
    let resolved = if raw < 0 { raw + len as i64 } else { raw };
    if resolved >= 0 && (resolved as usize) < len {
        Some(resolved as usize)
    } else {
        None
    }
}

fn invalid_operands(op: &Token, left: &Value, right: &Value) -> MryaError {
    MryaError::runtime(
        op,
        format!(
            "Invalid operands for {}: {}, {}",
            op.lexeme,
            left.repr(),
            right.repr()
        ),
    )
}

fn arithmetic(left: Value, op: &Token, right: Value) -> Result<Value, Flow> {
    if let (Value::Int(a), Value::Int(b)) = (&left, &right) {
        let result = match op.kind {
            TokenKind::Minus => a.checked_sub(*b),
            _ => a.checked_mul(*b),
        };
        return result
            .map(Value::Int)
            .ok_or_else(|| Flow::Error(MryaError::runtime(op, "Integer overflow.")));
    }

    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => Ok(Value::Float(match op.kind {
            TokenKind::Minus => a - b,
            _ => a * b,
        })),
        _ => Err(Flow::Error(invalid_operands(op, &left, &right))),
    }
}

/// `/` is true division: the result is always a float.
fn divide(left: Value, op: &Token, right: Value) -> Result<Value, Flow> {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => {
            if b == 0.0 {
                Err(Flow::Error(MryaError::runtime(op, "Division by zero.")))
            } else {
                Ok(Value::Float(a / b))
            }
        }
        _ => Err(Flow::Error(invalid_operands(op, &left, &right))),
    }
}

fn compare(left: Value, op: &Token, right: Value) -> Result<Value, Flow> {
    let ordering = match (&left, &right) {
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => match a.partial_cmp(&b) {
                Some(ordering) => ordering,
                None => return Ok(Value::Bool(false)),
            },
            _ => return Err(Flow::Error(invalid_operands(op, &left, &right))),
        },
    };

    let result = match op.kind {
        TokenKind::Greater => ordering.is_gt(),
        TokenKind::GreaterEqual => ordering.is_ge(),
        TokenKind::Less => ordering.is_lt(),
        _ => ordering.is_le(),
    };
    Ok(Value::Bool(result))
}

// ABOUTME: Module path resolution, caching, and cycle-safe loading

use crate::env::Environment;
use crate::error::{Flow, MryaError};
use crate::eval::Interpreter;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::token::Token;
use crate::value::{ModuleObj, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// The name an import statement binds its module under: the final path
/// component with the `package:` prefix and any extension stripped.
pub fn binding_name(path: &str) -> String {
    let stripped = path.strip_prefix("package:").unwrap_or(path);
    let base = Path::new(stripped)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| stripped.to_string());
    base
}

fn has_source_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("mrya") | Some("mr")
    )
}

impl Interpreter {
    /// Resolves and loads a module. Resolution order: registered native
    /// module name, then `package:` under the install root, then a path
    /// relative to the directory of the file currently being loaded.
    pub fn load_module(
        &mut self,
        path_str: &str,
        token: Option<&Token>,
    ) -> Result<Value, MryaError> {
        if let Some(module) = self.native_modules.get(path_str) {
            return Ok(module.clone());
        }

        let resolved = self.resolve_module_path(path_str);
        let cache_key = resolved.canonicalize().unwrap_or_else(|_| resolved.clone());

        if let Some(cached) = self.module_cache.get(&cache_key) {
            return Ok(cached.clone());
        }

        let source = std::fs::read_to_string(&resolved).map_err(|err| {
            let message = format!("Failed to import '{path_str}': {err}");
            match token {
                Some(token) => MryaError::runtime(token, message),
                None => MryaError::runtime_bare(message),
            }
        })?;

        let tokens = Lexer::new(&source).scan_tokens()?;
        let statements = Parser::new(tokens).parse()?;

        // Insert the fresh module into the cache before executing the file
        // so a re-entrant import of an in-progress module terminates.
        let module = Rc::new(ModuleObj {
            name: binding_name(path_str),
            exports: RefCell::new(HashMap::new()),
        });
        self.module_cache
            .insert(cache_key.clone(), Value::Module(module.clone()));

        let module_env = Environment::with_enclosing(self.globals.clone());
        let module_dir = resolved
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        self.dir_stack.push(module_dir);
        let result = self.execute_block(&statements, &module_env);
        self.dir_stack.pop();

        match result {
            Ok(()) => {
                // Expose the file's top-level bindings as the module's
                // attributes
                let mut exports = module.exports.borrow_mut();
                for (name, value) in module_env.local_bindings() {
                    exports.insert(name, value);
                }
                drop(exports);
                Ok(Value::Module(module))
            }
            // A top-level return replaces the module: files export a
            // single value (commonly a class) this way.
            Err(Flow::Return(value)) => {
                self.module_cache.insert(cache_key, value.clone());
                Ok(value)
            }
            Err(Flow::Error(err)) => {
                // A failed load stays out of the cache so it can be retried
                self.module_cache.remove(&cache_key);
                Err(err)
            }
            Err(Flow::Break) | Err(Flow::Continue) => {
                self.module_cache.remove(&cache_key);
                Err(MryaError::runtime_bare(format!(
                    "Loop control at top level of module '{path_str}'."
                )))
            }
        }
    }

    fn resolve_module_path(&self, path_str: &str) -> PathBuf {
        if let Some(rest) = path_str.strip_prefix("package:") {
            let rel = Path::new(rest);
            return if has_source_extension(rel) {
                self.install_root.join("packages").join(rel)
            } else {
                self.install_root
                    .join("packages")
                    .join(rest)
                    .join("main.mrya")
            };
        }

        let mut rel = PathBuf::from(path_str);
        if !has_source_extension(&rel) {
            rel.set_extension("mrya");
        }
        if rel.is_absolute() {
            rel
        } else {
            self.current_dir().join(rel)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_name_strips_extension() {
        assert_eq!(binding_name("utils"), "utils");
        assert_eq!(binding_name("utils.mrya"), "utils");
        assert_eq!(binding_name("lib/helpers.mrya"), "helpers");
    }

    #[test]
    fn test_binding_name_strips_package_prefix() {
        assert_eq!(binding_name("package:foo"), "foo");
        assert_eq!(binding_name("package:foo/tools.mrya"), "tools");
    }

    #[test]
    fn test_source_extension_detection() {
        assert!(has_source_extension(Path::new("a.mrya")));
        assert!(has_source_extension(Path::new("a.mr")));
        assert!(!has_source_extension(Path::new("a")));
        assert!(!has_source_extension(Path::new("a.txt")));
    }
}

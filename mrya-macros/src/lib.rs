//! Procedural macros for mrya native functions
//!
//! Provides the `#[native]` attribute macro for declaring host functions.
//! The attribute leaves the function definition untouched and emits an
//! `inventory` registration so the interpreter can collect every native
//! at startup without a hand-maintained list.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemFn};

/// Parse native attribute arguments: module = "...", name = "...", interp
fn parse_native_args(attr_stream: TokenStream) -> (String, String, bool) {
    let attr_str = attr_stream.to_string();

    let mut module = String::new();
    let mut name = String::new();

    // Parse module
    if let Some(start) = attr_str.find("module = \"") {
        let rest = &attr_str[start + 10..];
        if let Some(end) = rest.find('"') {
            module = rest[..end].to_string();
        }
    }

    // Parse name
    if let Some(start) = attr_str.find("name = \"") {
        let rest = &attr_str[start + 8..];
        if let Some(end) = rest.find('"') {
            name = rest[..end].to_string();
        }
    }

    // The bare word `interp` marks an interpreter-aware native
    let interp = attr_str
        .split(',')
        .any(|part| part.trim() == "interp");

    (module, name, interp)
}

/// Attribute macro for declaring Mrya native functions
///
/// Registers the function under the given module and name. Functions in the
/// special module `"builtins"` are bound directly into the global
/// environment; every other module is assembled into a native module value
/// importable by name.
///
/// # Attribute Arguments
///
/// - `module`: Native module the function belongs to (e.g., "math")
/// - `name`: The Mrya name of the function (defaults to the Rust name)
/// - `interp`: Pass the interpreter as the first argument (for natives
///   that load modules, call back into user code, or resolve paths
///   against the current loading directory)
///
/// # Example
///
/// ```ignore
/// #[native(module = "math", name = "abs")]
/// pub fn abs_fn(args: &[Value]) -> Result<Value, NativeError> {
///     // ...
/// }
/// ```
#[proc_macro_attribute]
pub fn native(attr: TokenStream, item: TokenStream) -> TokenStream {
    let func = parse_macro_input!(item as ItemFn);

    let (module, name, interp) = parse_native_args(attr);

    let fn_name = func.sig.ident.clone();
    let name_to_use = if name.is_empty() {
        fn_name.to_string()
    } else {
        name
    };

    let module_to_use = if module.is_empty() {
        "builtins".to_string()
    } else {
        module
    };

    let kind = if interp {
        quote! { crate::natives::NativeKind::Interp(#fn_name) }
    } else {
        quote! { crate::natives::NativeKind::Pure(#fn_name) }
    };

    let expanded = quote! {
        #func

        ::inventory::submit! {
            crate::natives::NativeSpec {
                module: #module_to_use,
                name: #name_to_use,
                kind: #kind,
            }
        }
    };

    TokenStream::from(expanded)
}

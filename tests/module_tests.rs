// ABOUTME: Tests for the module loader: resolution, caching, cycles, exports

use mrya::error::MryaError;
use mrya::eval::Interpreter;
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Writes `source` as main.mrya in `dir` and runs it there, capturing output.
fn run_in(dir: &Path, source: &str) -> Result<String, MryaError> {
    let main = dir.join("main.mrya");
    fs::write(&main, source).unwrap();

    let buffer = Rc::new(RefCell::new(String::new()));
    let mut interpreter = Interpreter::with_capture(buffer.clone());
    interpreter.run(source, Some(&main))?;
    let printed = buffer.borrow().clone();
    Ok(printed)
}

fn run_in_ok(dir: &Path, source: &str) -> String {
    run_in(dir, source).expect("execution failed")
}

#[test]
fn test_import_binds_under_basename() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "utils.mrya",
        "func add = define(a, b) { return a + b }\nlet answer = 42\n",
    );

    let printed = run_in_ok(
        dir.path(),
        "import(\"utils\")\noutput(utils.add(1, 2))\noutput(utils.answer)\n",
    );
    assert_eq!(printed, "3\n42\n");
}

#[test]
fn test_import_with_explicit_extension() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "utils.mrya", "let x = 1\n");
    assert_eq!(
        run_in_ok(dir.path(), "import(\"utils.mrya\")\noutput(utils.x)\n"),
        "1\n"
    );
}

#[test]
fn test_relative_imports_resolve_against_importing_file() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "lib/inner.mrya", "let value = \"inner\"\n");
    write_file(
        dir.path(),
        "lib/helpers.mrya",
        "import(\"inner\")\nfunc peek = define() { return inner.value }\n",
    );

    let printed = run_in_ok(
        dir.path(),
        "import(\"lib/helpers\")\noutput(helpers.peek())\n",
    );
    assert_eq!(printed, "inner\n");
}

#[test]
fn test_module_cache_runs_side_effects_once() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "noisy.mrya", "output(\"loaded\")\nlet x = 1\n");

    let printed = run_in_ok(
        dir.path(),
        "import(\"noisy\")\nimport(\"noisy\")\noutput(noisy.x)\n",
    );
    assert_eq!(printed, "loaded\n1\n");
}

#[test]
fn test_cyclic_imports_terminate() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "a.mrya",
        "import(\"b\")\nfunc fa = define() { return \"a\" + b.fb() }\n",
    );
    write_file(
        dir.path(),
        "b.mrya",
        "import(\"a\")\nfunc fb = define() { return \"b\" }\n",
    );

    let printed = run_in_ok(dir.path(), "import(\"a\")\noutput(a.fa())\n");
    assert_eq!(printed, "ab\n");
}

#[test]
fn test_top_level_return_exports_a_class() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "shape.mrya",
        "
class Shape {
  func _start_ = define(name) { this.name = name }
  func describe = define() { return \"shape: \" + this.name }
}
return Shape
",
    );

    let printed = run_in_ok(
        dir.path(),
        "import(\"shape\")\nlet s = shape(\"circle\")\noutput(s.describe())\n",
    );
    assert_eq!(printed, "shape: circle\n");
}

#[test]
fn test_import_expression_returns_module_value() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "utils.mrya", "let x = 7\n");
    assert_eq!(
        run_in_ok(dir.path(), "let m = import(\"utils\")\noutput(m.x)\n"),
        "7\n"
    );
}

#[test]
fn test_modules_are_not_callable() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "utils.mrya", "let x = 1\n");
    let err = run_in(dir.path(), "import(\"utils\")\nlet y = utils()\n")
        .expect_err("modules must not be callable");
    assert_eq!(err.kind_name(), "RuntimeError");
    assert!(err.message().contains("return"));
}

#[test]
fn test_missing_module_attribute() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "utils.mrya", "let x = 1\n");
    let err = run_in(dir.path(), "import(\"utils\")\noutput(utils.ghost)\n")
        .expect_err("missing attribute");
    assert_eq!(err.kind_name(), "RuntimeError");
}

#[test]
fn test_missing_file_import_fails() {
    let dir = TempDir::new().unwrap();
    let err = run_in(dir.path(), "import(\"nope\")\n").expect_err("import should fail");
    assert_eq!(err.kind_name(), "RuntimeError");
    assert!(err.message().contains("Failed to import"));
}

#[test]
fn test_errors_in_imported_module_propagate() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "bad.mrya", "raise(\"broken module\")\n");
    let err = run_in(dir.path(), "import(\"bad\")\n").expect_err("module error");
    assert_eq!(err.kind_name(), "RaisedError");
}

#[test]
fn test_parse_errors_in_imported_module_keep_their_kind() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "bad.mrya", "let = 1\n");
    let err = run_in(dir.path(), "import(\"bad\")\n").expect_err("module error");
    assert_eq!(err.kind_name(), "ParseError");
}

#[test]
fn test_native_module_import() {
    let dir = TempDir::new().unwrap();
    let printed = run_in_ok(
        dir.path(),
        "import(\"math\")\noutput(math.abs(-5))\noutput(math.down(2.9))\n",
    );
    assert_eq!(printed, "5\n2\n");
}

#[test]
fn test_package_imports_resolve_under_install_root() {
    let root = TempDir::new().unwrap();
    write_file(
        root.path(),
        "packages/greet/main.mrya",
        "func hello = define() { return \"hi\" }\n",
    );

    let dir = TempDir::new().unwrap();
    let source = "import(\"package:greet\")\noutput(greet.hello())\n";
    let main = dir.path().join("main.mrya");
    fs::write(&main, source).unwrap();

    let buffer = Rc::new(RefCell::new(String::new()));
    let mut interpreter = Interpreter::with_capture(buffer.clone());
    interpreter.set_install_root(root.path().to_path_buf());
    interpreter.run(source, Some(&main)).expect("package import");
    assert_eq!(*buffer.borrow(), "hi\n");
}

#[test]
fn test_package_import_with_explicit_file() {
    let root = TempDir::new().unwrap();
    write_file(
        root.path(),
        "packages/greet/extra.mrya",
        "let note = \"extra\"\n",
    );

    let dir = TempDir::new().unwrap();
    let source = "import(\"package:greet/extra.mrya\")\noutput(extra.note)\n";
    let main = dir.path().join("main.mrya");
    fs::write(&main, source).unwrap();

    let buffer = Rc::new(RefCell::new(String::new()));
    let mut interpreter = Interpreter::with_capture(buffer.clone());
    interpreter.set_install_root(root.path().to_path_buf());
    interpreter.run(source, Some(&main)).expect("package import");
    assert_eq!(*buffer.borrow(), "extra\n");
}

#[test]
fn test_module_functions_close_over_module_scope() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "counter.mrya",
        "
let n = 0
func bump = define() {
  n = n + 1
  return n
}
",
    );

    let printed = run_in_ok(
        dir.path(),
        "import(\"counter\")\noutput(counter.bump())\noutput(counter.bump())\n",
    );
    assert_eq!(printed, "1\n2\n");
}

#[test]
fn test_failed_load_can_be_retried() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "flaky.mrya", "raise(\"first time\")\n");

    let main = dir.path().join("main.mrya");
    let source = "
try { import(\"flaky\") } catch RaisedError { output(\"failed\") }
try { import(\"flaky\") } catch RaisedError { output(\"failed again\") }
";
    fs::write(&main, source).unwrap();

    let buffer = Rc::new(RefCell::new(String::new()));
    let mut interpreter = Interpreter::with_capture(buffer.clone());
    interpreter.run(source, Some(&main)).expect("catches handle it");
    assert_eq!(*buffer.borrow(), "failed\nfailed again\n");
}

mod ast;
mod config;
mod env;
mod error;
mod eval;
mod highlighter;
mod lexer;
mod loader;
mod natives;
mod parser;
mod token;
mod value;

use clap::Parser as ClapParser;
use error::MryaError;
use eval::Interpreter;
use highlighter::MryaHelper;
use lexer::Lexer;
use parser::Parser;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use std::path::{Path, PathBuf};

/// The Mrya interpreter
#[derive(ClapParser, Debug)]
#[command(name = "mrya")]
#[command(version = config::VERSION)]
#[command(about = "Run Mrya source files or start a REPL")]
struct CliArgs {
    /// Path to a .mrya source file. If omitted, starts the REPL.
    #[arg(value_name = "FILE")]
    source: Option<PathBuf>,

    /// Print tokens produced by the lexer before running
    #[arg(short = 't', long = "tokens")]
    show_tokens: bool,

    /// Print the AST (parsed statements) before running
    #[arg(short = 'a', long = "ast")]
    show_ast: bool,
}

fn main() {
    let args = CliArgs::parse();

    let code = match &args.source {
        Some(path) => run_file(path, args.show_tokens, args.show_ast),
        None => run_repl(args.show_tokens, args.show_ast),
    };
    std::process::exit(code);
}

fn run_file(path: &Path, show_tokens: bool, show_ast: bool) -> i32 {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Error: could not open file '{}': {err}", path.display());
            return 1;
        }
    };

    let mut interpreter = Interpreter::new();
    match run_source(&mut interpreter, &source, Some(path), show_tokens, show_ast) {
        Ok(()) => 0,
        Err(err) => {
            print_error_context(&source, &err);
            1
        }
    }
}

fn run_source(
    interpreter: &mut Interpreter,
    source: &str,
    path: Option<&Path>,
    show_tokens: bool,
    show_ast: bool,
) -> Result<(), MryaError> {
    let tokens = Lexer::new(source).scan_tokens()?;
    if show_tokens {
        println!("=== Tokens ===");
        for token in &tokens {
            println!("{token}");
        }
        println!("==============");
    }

    let statements = Parser::new(tokens).parse()?;
    if show_ast {
        println!("=== AST / Parsed Statements ===");
        for statement in &statements {
            println!("{statement:?}");
        }
        println!("================================");
    }

    let base_dir = path
        .and_then(|p| p.parent())
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    interpreter.execute_program(&statements, base_dir)
}

fn run_repl(show_tokens: bool, show_ast: bool) -> i32 {
    let mut interpreter = Interpreter::new();

    let config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<MryaHelper, DefaultHistory> = match Editor::with_config(config) {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("Failed to initialize REPL: {err}");
            return 1;
        }
    };
    rl.set_helper(Some(MryaHelper::new()));
    let _ = rl.load_history(config::HISTORY_FILE);

    println!("{}", config::WELCOME_MESSAGE);
    println!("{}", config::WELCOME_SUBTITLE);
    println!("{}", config::WELCOME_FOOTER);

    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() { ">>> " } else { "... " };
        match rl.readline(prompt) {
            Ok(line) => {
                // A trailing backslash continues the input on the next line
                let trimmed = line.trim_end();
                if let Some(stripped) = trimmed.strip_suffix('\\') {
                    buffer.push_str(stripped);
                    buffer.push('\n');
                    continue;
                }
                buffer.push_str(&line);
                buffer.push('\n');

                let source = std::mem::take(&mut buffer);
                if source.trim().is_empty() {
                    continue;
                }

                if let Err(err) =
                    run_source(&mut interpreter, &source, None, show_tokens, show_ast)
                {
                    print_error_context(&source, &err);
                }
            }
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
                println!("^C");
            }
            Err(ReadlineError::Eof) => {
                println!("\nExiting Mrya REPL.");
                break;
            }
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        }
    }

    let _ = rl.save_history(config::HISTORY_FILE);
    0
}

/// Prints `[Line N] <Kind>: <message>` plus the offending source line and
/// a caret underline spanning the lexeme.
fn print_error_context(source: &str, error: &MryaError) {
    let Some(line_num) = error.line() else {
        eprintln!("{}: {}", error.kind_name(), error.message());
        return;
    };

    eprintln!("\n[Line {line_num}] {}: {}", error.kind_name(), error.message());

    let lines: Vec<&str> = source.lines().collect();
    // Errors can point just past the input (e.g. unexpected EOF)
    if line_num == 0 || line_num > lines.len() {
        return;
    }
    let error_line = lines[line_num - 1];
    eprintln!("  {line_num} | {error_line}");

    if let Some(token) = error.token() {
        if !token.lexeme.is_empty() {
            let start_col = error_line.find(&token.lexeme).unwrap_or(0);
            let underline_width = token.lexeme.chars().count().max(1);
            eprintln!(
                "    | {}{}",
                " ".repeat(start_col),
                "^".repeat(underline_width)
            );
        }
    }
}

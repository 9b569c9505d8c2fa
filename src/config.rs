// ABOUTME: Version info, REPL banner text, and install-root configuration

use std::path::PathBuf;

pub const VERSION: &str = "0.8.0";
pub const WELCOME_MESSAGE: &str = "Mrya REPL v0.8";
pub const WELCOME_SUBTITLE: &str =
    "Type your code; a trailing backslash continues input on the next line.";
pub const WELCOME_FOOTER: &str = "Use Ctrl+D to exit.";

pub const HISTORY_FILE: &str = ".mrya_history";

/// The install root under which `package:` imports resolve
/// (`<install_root>/packages/<name>/main.mrya`).
pub fn install_root() -> PathBuf {
    std::env::var_os("MRYA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

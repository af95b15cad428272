//! Debug tracing for the pipeline engine.
//!
//! Off by default. Turned on by `--debug` or by setting `PIPESH_DEBUG` in the
//! environment. Every line goes to stderr, tagged with its category
//! (`pipe`, `spawn`, `wait`, `state`).
//!
//! Never trace between fork and exec: formatting allocates.

use std::env;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;

static ENABLED: AtomicBool = AtomicBool::new(false);

pub const ENV_VAR: &str = "PIPESH_DEBUG";

pub fn set_enabled(on: bool) {
    ENABLED.store(on, Ordering::Relaxed);
}

pub fn enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Enable tracing if requested on the command line or via the environment.
pub fn init(from_flag: bool) {
    let from_env = env::var_os(ENV_VAR).is_some_and(|v| !v.is_empty() && v != "0");
    set_enabled(from_flag || from_env);
}

#[doc(hidden)]
pub fn emit(category: &str, args: fmt::Arguments<'_>) {
    eprintln!("{} {}", format!("[{category}]").as_str().dimmed(), args);
}

/// `trace!(category, "format", args...)`
#[macro_export]
macro_rules! trace {
    ($category:ident, $($arg:tt)+) => {
        if $crate::trace::enabled() {
            $crate::trace::emit(stringify!($category), format_args!($($arg)+));
        }
    };
}

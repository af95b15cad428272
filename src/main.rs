use std::io::{self, IsTerminal};
use std::process;

use pipesh::config::{Args, Config};
use pipesh::error::print_error;
use pipesh::shell::Shell;
use pipesh::trace;

fn print_version() {
    println!("pipesh v{}", env!("CARGO_PKG_VERSION"));
}

fn main() {
    let args: Args = argh::from_env();
    if args.version {
        print_version();
        process::exit(0);
    }

    if !io::stderr().is_terminal() {
        colored::control::set_override(false);
    }

    let config = match Config::try_from(args) {
        Ok(config) => config,
        Err(err) => {
            print_error(&err);
            process::exit(2);
        }
    };
    trace::init(config.debug);

    let mut shell = Shell::new(&config);
    if let Err(e) = shell.run() {
        print_error(&format_args!("error reading input: {e}"));
        process::exit(1);
    }
}

use argh::FromArgs;

use crate::error::ConfigError;

pub const DEFAULT_PROMPT: &str = ">";

/// Arguments kept per command when `--max-args` is not given.
pub const DEFAULT_MAX_ARGS: usize = 9;

#[derive(FromArgs, Debug, PartialEq)]
/// pipesh - run commands and pipelines of commands
pub struct Args {
    /// prompt shown before each line (default ">")
    #[argh(positional)]
    pub prompt: Option<String>,

    /// maximum number of arguments kept per command, program included
    #[argh(option, default = "DEFAULT_MAX_ARGS")]
    pub max_args: usize,

    /// trace pipe, spawn and wait activity on stderr
    #[argh(switch, short = 'd')]
    pub debug: bool,

    /// print version
    #[argh(switch, short = 'v')]
    pub version: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub prompt: String,
    pub max_args: usize,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            max_args: DEFAULT_MAX_ARGS,
            debug: false,
        }
    }
}

impl TryFrom<Args> for Config {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, ConfigError> {
        if args.max_args == 0 {
            return Err(ConfigError::ZeroMaxArgs);
        }
        Ok(Self {
            prompt: args.prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            max_args: args.max_args,
            debug: args.debug,
        })
    }
}

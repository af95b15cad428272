use crate::command::{CommandSpec, Pipeline};
use crate::error::ParseError;

/// The word that ends the session when given as a lone command.
pub const EXIT_COMMAND: &str = "exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// Nothing but whitespace.
    Empty,
    Exit,
    Pipeline(Pipeline),
}

/// Parse user input into a pipeline.
/// e.g., "ls -l | grep foo | wc -l" -> three stages
///
/// Splits on `|` first, then on whitespace within each segment. Every
/// command keeps at most `max_args` arguments (program name included); the
/// rest are dropped silently.
pub fn parse_line(line: &str, max_args: usize) -> Result<ParsedLine, ParseError> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.trim().is_empty() {
        return Ok(ParsedLine::Empty);
    }

    let mut stages = Vec::new();
    for (position, segment) in line.split('|').enumerate() {
        if segment.contains('\0') {
            return Err(ParseError::NulByte { position });
        }
        let args: Vec<String> = segment
            .split_whitespace()
            .take(max_args)
            .map(str::to_owned)
            .collect();
        let spec = CommandSpec::new(args).ok_or(ParseError::EmptyCommand { position })?;
        stages.push(spec);
    }

    if let [only] = stages.as_slice() {
        if only.program() == EXIT_COMMAND {
            return Ok(ParsedLine::Exit);
        }
    }

    // split always yields at least one segment
    let pipeline = Pipeline::new(stages).ok_or(ParseError::EmptyCommand { position: 0 })?;
    Ok(ParsedLine::Pipeline(pipeline))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stages(line: &str) -> Vec<Vec<String>> {
        match parse_line(line, 9).unwrap() {
            ParsedLine::Pipeline(p) => p.iter().map(|s| s.args().to_vec()).collect(),
            other => panic!("expected a pipeline, got {other:?}"),
        }
    }

    #[test]
    fn plain_command() {
        assert_eq!(stages("ls -l /tmp\n"), vec![vec!["ls", "-l", "/tmp"]]);
    }

    #[test]
    fn splits_on_pipe_then_whitespace() {
        assert_eq!(
            stages("   cat commands.txt |wc   |   wc -l  "),
            vec![vec!["cat", "commands.txt"], vec!["wc"], vec!["wc", "-l"]]
        );
        assert_eq!(stages("a\t-b|c"), vec![vec!["a", "-b"], vec!["c"]]);
    }

    #[test]
    fn truncates_extra_arguments() {
        let line = "echo 1 2 3 4 5 6 7 8 9 10 11";
        let got = stages(line);
        assert_eq!(got[0].len(), 9);
        assert_eq!(got[0].last().unwrap(), "8");

        match parse_line("echo a b c | wc -l -c", 2).unwrap() {
            ParsedLine::Pipeline(p) => {
                assert_eq!(p[0].args(), ["echo", "a"]);
                assert_eq!(p[1].args(), ["wc", "-l"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn blank_lines_are_empty() {
        assert_eq!(parse_line("", 9), Ok(ParsedLine::Empty));
        assert_eq!(parse_line("  \t \n", 9), Ok(ParsedLine::Empty));
    }

    #[test]
    fn empty_segments_are_malformed() {
        assert_eq!(parse_line("ls |", 9), Err(ParseError::EmptyCommand { position: 1 }));
        assert_eq!(parse_line("| wc", 9), Err(ParseError::EmptyCommand { position: 0 }));
        assert_eq!(parse_line("a || b", 9), Err(ParseError::EmptyCommand { position: 1 }));
        assert_eq!(parse_line("|", 9), Err(ParseError::EmptyCommand { position: 0 }));
    }

    #[test]
    fn nul_bytes_are_rejected() {
        assert_eq!(parse_line("ls | gr\0ep", 9), Err(ParseError::NulByte { position: 1 }));
    }

    #[test]
    fn exit_only_as_lone_command() {
        assert_eq!(parse_line("exit", 9), Ok(ParsedLine::Exit));
        assert_eq!(parse_line("  exit  \n", 9), Ok(ParsedLine::Exit));
        assert_eq!(parse_line("exit 3", 9), Ok(ParsedLine::Exit));
        assert_eq!(stages("exit | cat"), vec![vec!["exit"], vec!["cat"]]);
        assert_eq!(stages("exitcode"), vec![vec!["exitcode"]]);
    }
}

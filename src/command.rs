use std::ops::Index;
use std::slice;

/// One stage of a pipeline: the program name followed by its arguments.
///
/// Never empty, and no argument is empty. Built by the parser and left
/// untouched until the pipeline that owns it has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    args: Vec<String>,
}

impl CommandSpec {
    /// Returns `None` if `args` is empty or holds an empty argument.
    pub fn new(args: Vec<String>) -> Option<Self> {
        if args.is_empty() || args.iter().any(|a| a.is_empty()) {
            return None;
        }
        Some(Self { args })
    }

    pub fn program(&self) -> &str {
        &self.args[0]
    }

    /// Full argument vector, program name included.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn display(&self) -> String {
        self.args.join(" ")
    }
}

/// An ordered chain of commands, each feeding the next. Holds at least one
/// stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<CommandSpec>,
}

impl Pipeline {
    /// Returns `None` for an empty list of stages.
    pub fn new(stages: Vec<CommandSpec>) -> Option<Self> {
        if stages.is_empty() {
            None
        } else {
            Some(Self { stages })
        }
    }

    pub fn single(spec: CommandSpec) -> Self {
        Self { stages: vec![spec] }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Number of pipes needed to connect every stage.
    pub fn pipe_count(&self) -> usize {
        self.stages.len() - 1
    }

    pub fn iter(&self) -> slice::Iter<'_, CommandSpec> {
        self.stages.iter()
    }

    pub fn last(&self) -> &CommandSpec {
        &self.stages[self.stages.len() - 1]
    }
}

impl Index<usize> for Pipeline {
    type Output = CommandSpec;

    fn index(&self, index: usize) -> &CommandSpec {
        &self.stages[index]
    }
}

impl<'a> IntoIterator for &'a Pipeline {
    type Item = &'a CommandSpec;
    type IntoIter = slice::Iter<'a, CommandSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(args: &[&str]) -> CommandSpec {
        CommandSpec::new(args.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn rejects_empty_specs() {
        assert!(CommandSpec::new(vec![]).is_none());
        assert!(CommandSpec::new(vec!["ls".into(), String::new()]).is_none());
    }

    #[test]
    fn program_is_first_argument() {
        let s = spec(&["grep", "-v", "foo"]);
        assert_eq!(s.program(), "grep");
        assert_eq!(s.args().len(), 3);
        assert_eq!(s.display(), "grep -v foo");
    }

    #[test]
    fn pipeline_needs_one_pipe_less_than_stages() {
        assert!(Pipeline::new(vec![]).is_none());

        let single = Pipeline::single(spec(&["true"]));
        assert_eq!(single.len(), 1);
        assert_eq!(single.pipe_count(), 0);

        let p = Pipeline::new(vec![spec(&["ls"]), spec(&["sort"]), spec(&["wc", "-l"])]).unwrap();
        assert_eq!(p.pipe_count(), 2);
        assert_eq!(p[1].program(), "sort");
        assert_eq!(p.last().program(), "wc");
    }
}

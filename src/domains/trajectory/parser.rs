//! Recursive-descent parser for the build-script text format.
//!
//! Grammar per line: `<name` references a serial sub-script, `simscript(...)`
//! composes branches in parallel, `name(arg, ...)` is a leaf command, and a
//! bare `name` is an implicit sub-script reference. `#`-prefixed and blank
//! lines are skipped.

use tracing::debug;

use crate::common::ConfigError;
use crate::domains::trajectory::ast::Command;
use crate::domains::trajectory::ports::ScriptSource;

pub struct ScriptParser<'a> {
    source: &'a dyn ScriptSource,
}

impl<'a> ScriptParser<'a> {
    pub fn new(source: &'a dyn ScriptSource) -> Self {
        Self { source }
    }

    /// Parse a named script, resolving sub-script references recursively.
    pub fn parse_script(&self, name: &str) -> Result<Command, ConfigError> {
        let text = self.source.resolve(name)?;
        self.parse_text(name, &text)
    }

    /// Parse script text under the given name without resolving it first.
    pub fn parse_text(&self, name: &str, text: &str) -> Result<Command, ConfigError> {
        let mut children = Vec::new();
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            debug!(script = %name, line = lineno + 1, "parsing: {line}");
            children.push(self.parse_line(line)?);
        }
        Ok(Command::Serial {
            script: name.to_string(),
            children,
        })
    }

    fn parse_line(&self, line: &str) -> Result<Command, ConfigError> {
        if let Some(reference) = line.strip_prefix('<') {
            return self.parse_script(&with_txt_suffix(reference));
        }

        if line.starts_with("simscript") {
            return self.parse_simscript(line);
        }

        if !line.contains('(') {
            // Sub-script reference missing its `<` prefix; common in authored
            // scripts, resolved the same way.
            return self.parse_script(&with_txt_suffix(line));
        }

        let (name, rest) = line
            .split_once('(')
            .ok_or_else(|| ConfigError::MalformedScript {
                script: String::new(),
                line: line.to_string(),
            })?;
        let inner = rest.strip_suffix(')').unwrap_or(rest);
        let args = if inner.trim().is_empty() {
            Vec::new()
        } else {
            inner.split(',').map(|a| a.trim().to_string()).collect()
        };
        Ok(Command::Leaf {
            name: name.trim().to_string(),
            args,
        })
    }

    /// Split a `simscript(...)` invocation into its parallel branches.
    ///
    /// Branches are separated by top-level commas, found with a
    /// parenthesis-depth counter. Authored scripts frequently omit the final
    /// closing parenthesis; when the last branch is unbalanced by exactly one
    /// closing paren, its trailing character is dropped instead of failing.
    fn parse_simscript(&self, line: &str) -> Result<Command, ConfigError> {
        let args = line
            .split_once('(')
            .map(|(_, rest)| rest)
            .ok_or_else(|| ConfigError::MalformedScript {
                script: "simscript".to_string(),
                line: line.to_string(),
            })?;

        let mut branches: Vec<String> = Vec::new();
        let mut depth = 0i32;
        let mut start = 0usize;
        for (i, c) in args.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                ',' if depth == 0 => {
                    branches.push(args[start..i].to_string());
                    start = i + 1;
                }
                _ => {}
            }
        }
        if start < args.len() {
            let mut last = &args[start..];
            let opens = last.matches('(').count() as i32;
            let closes = last.matches(')').count() as i32;
            if opens - closes == -1 {
                last = &last[..last.len() - 1];
            }
            branches.push(last.to_string());
        }

        debug!("simscript branches: {branches:?}");

        let mut children = Vec::new();
        for branch in &branches {
            children.push(self.parse_line(branch.trim())?);
        }

        // Wrapped in a serial node so the compiled frames record the
        // parallel section on their script stack.
        Ok(Command::Serial {
            script: "simscript".to_string(),
            children: vec![Command::Parallel { children }],
        })
    }
}

fn with_txt_suffix(name: &str) -> String {
    if name.contains(".txt") {
        name.to_string()
    } else {
        format!("{name}.txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Scripts(HashMap<String, String>);

    impl ScriptSource for Scripts {
        fn resolve(&self, name: &str) -> Result<String, ConfigError> {
            self.0
                .get(name)
                .cloned()
                .ok_or_else(|| ConfigError::ScriptNotFound {
                    name: name.to_string(),
                })
        }
    }

    fn scripts(entries: &[(&str, &str)]) -> Scripts {
        Scripts(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn leaf_lines_parse_name_and_args() {
        let src = scripts(&[("a.txt", "zmove(Z01, 1.5, 0)")]);
        let ast = ScriptParser::new(&src).parse_script("a.txt").unwrap();
        let Command::Serial { children, .. } = ast else {
            panic!("expected serial root")
        };
        assert_eq!(
            children[0],
            Command::Leaf {
                name: "zmove".to_string(),
                args: vec!["Z01".to_string(), "1.5".to_string(), "0".to_string()],
            }
        );
    }

    #[test]
    fn comments_and_blanks_are_skipped() {
        let src = scripts(&[("a.txt", "# header\n\nwait(1)\n   \n# trailing")]);
        let ast = ScriptParser::new(&src).parse_script("a.txt").unwrap();
        let Command::Serial { children, .. } = ast else {
            panic!("expected serial root")
        };
        assert_eq!(children.len(), 1);
    }

    #[test]
    fn sub_script_reference_appends_txt_suffix() {
        let src = scripts(&[("a.txt", "<b"), ("b.txt", "wait(1)")]);
        let ast = ScriptParser::new(&src).parse_script("a.txt").unwrap();
        let Command::Serial { children, .. } = ast else {
            panic!("expected serial root")
        };
        assert!(matches!(&children[0], Command::Serial { script, .. } if script == "b.txt"));
    }

    #[test]
    fn bare_name_is_an_implicit_sub_script() {
        let src = scripts(&[("a.txt", "b"), ("b.txt", "wait(1)")]);
        let ast = ScriptParser::new(&src).parse_script("a.txt").unwrap();
        let Command::Serial { children, .. } = ast else {
            panic!("expected serial root")
        };
        assert!(matches!(&children[0], Command::Serial { script, .. } if script == "b.txt"));
    }

    #[test]
    fn missing_script_is_fatal() {
        let src = scripts(&[("a.txt", "<nope")]);
        let err = ScriptParser::new(&src).parse_script("a.txt").unwrap_err();
        assert!(matches!(err, ConfigError::ScriptNotFound { .. }));
    }

    #[test]
    fn simscript_splits_on_top_level_commas_only() {
        let src = scripts(&[("a.txt", "simscript(zmove(1, 2, 3), wait(1))")]);
        let ast = ScriptParser::new(&src).parse_script("a.txt").unwrap();
        let Command::Serial { children, .. } = ast else {
            panic!("expected serial root")
        };
        let Command::Serial { script, children } = &children[0] else {
            panic!("expected simscript wrapper")
        };
        assert_eq!(script, "simscript");
        let Command::Parallel { children } = &children[0] else {
            panic!("expected parallel node")
        };
        assert_eq!(children.len(), 2);
        assert!(matches!(&children[0], Command::Leaf { name, args } if name == "zmove" && args.len() == 3));
    }

    #[test]
    fn simscript_tolerates_missing_closing_paren() {
        let good = scripts(&[("a.txt", "simscript(wait(1), wait(2))")]);
        let bad = scripts(&[("a.txt", "simscript(wait(1), wait(2)")]);
        let parsed_good = ScriptParser::new(&good).parse_script("a.txt").unwrap();
        let parsed_bad = ScriptParser::new(&bad).parse_script("a.txt").unwrap();
        assert_eq!(parsed_good, parsed_bad);
    }
}

// Script Splitter
// Splits SQL script text into statements on a configurable separator

use crate::error::{InitError, InitResult};
use crate::resource::ScriptHandle;
use crate::script::encoding::ScriptEncoding;
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_SEPARATOR: &str = ";";

const LINE_COMMENT: &str = "--";
const BLOCK_COMMENT_START: &str = "/*";
const BLOCK_COMMENT_END: &str = "*/";

/// Lexical mode of the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment,
}

/// What the scanner does with the bytes consumed by one transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanAction {
    /// Append to the current statement
    Keep(usize),
    /// Drop without appending (comment text)
    Skip(usize),
    /// Consume a separator and end the current statement
    Break(usize),
}

impl ScanAction {
    fn len(&self) -> usize {
        match *self {
            ScanAction::Keep(n) | ScanAction::Skip(n) | ScanAction::Break(n) => n,
        }
    }
}

impl ScanMode {
    /// Single transition function of the scanner.
    ///
    /// `rest` is the unconsumed, non-empty remainder of the script. Every
    /// transition out of `Normal` consumes at least one byte; `LineComment`
    /// hands the terminating newline back to `Normal` without consuming it.
    pub fn transition(self, rest: &str, separator: &str) -> (ScanMode, ScanAction) {
        let ch = match rest.chars().next() {
            Some(ch) => ch,
            None => return (self, ScanAction::Skip(0)),
        };
        let width = ch.len_utf8();

        match self {
            ScanMode::Normal => {
                if rest.starts_with(LINE_COMMENT) {
                    (ScanMode::LineComment, ScanAction::Skip(LINE_COMMENT.len()))
                } else if rest.starts_with(BLOCK_COMMENT_START) {
                    (ScanMode::BlockComment, ScanAction::Skip(BLOCK_COMMENT_START.len()))
                } else if !separator.is_empty() && rest.starts_with(separator) {
                    (ScanMode::Normal, ScanAction::Break(separator.len()))
                } else if ch == '\'' {
                    (ScanMode::SingleQuoted, ScanAction::Keep(width))
                } else if ch == '"' {
                    (ScanMode::DoubleQuoted, ScanAction::Keep(width))
                } else {
                    (ScanMode::Normal, ScanAction::Keep(width))
                }
            }
            ScanMode::SingleQuoted | ScanMode::DoubleQuoted => {
                let quote = if self == ScanMode::SingleQuoted { '\'' } else { '"' };
                if ch == '\\' {
                    let escaped = rest[width..].chars().next().map_or(0, char::len_utf8);
                    (self, ScanAction::Keep(width + escaped))
                } else if ch == quote {
                    (ScanMode::Normal, ScanAction::Keep(width))
                } else {
                    (self, ScanAction::Keep(width))
                }
            }
            ScanMode::LineComment => {
                if ch == '\n' {
                    (ScanMode::Normal, ScanAction::Skip(0))
                } else {
                    (ScanMode::LineComment, ScanAction::Skip(width))
                }
            }
            ScanMode::BlockComment => {
                if rest.starts_with(BLOCK_COMMENT_END) {
                    (ScanMode::Normal, ScanAction::Skip(BLOCK_COMMENT_END.len()))
                } else {
                    (ScanMode::BlockComment, ScanAction::Skip(width))
                }
            }
        }
    }

    /// Construct left open if the script ends in this mode
    fn unterminated(self) -> Option<Unterminated> {
        match self {
            ScanMode::SingleQuoted => Some(Unterminated::SingleQuote),
            ScanMode::DoubleQuoted => Some(Unterminated::DoubleQuote),
            ScanMode::BlockComment => Some(Unterminated::BlockComment),
            ScanMode::Normal | ScanMode::LineComment => None,
        }
    }
}

/// Construct a script ended inside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unterminated {
    SingleQuote,
    DoubleQuote,
    BlockComment,
}

impl fmt::Display for Unterminated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Unterminated::SingleQuote => "single-quoted literal",
            Unterminated::DoubleQuote => "double-quoted literal",
            Unterminated::BlockComment => "block comment",
        })
    }
}

/// One statement extracted from a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Name of the script the statement came from
    pub script: Arc<str>,
    /// 0-based position among the script's non-empty statements
    pub index: usize,
    /// 1-based line the statement starts on
    pub line: usize,
    pub sql: String,
}

/// Splits scripts into statements
#[derive(Debug, Clone)]
pub struct ScriptSplitter {
    separator: String,
    encoding: ScriptEncoding,
}

impl ScriptSplitter {
    pub fn new(separator: impl Into<String>, encoding: ScriptEncoding) -> Self {
        Self {
            separator: separator.into(),
            encoding,
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Read and decode the script, returning a lazy statement sequence.
    /// Each call re-reads the handle from the start.
    pub fn split(&self, handle: &ScriptHandle) -> InitResult<Statements> {
        let bytes = handle.read_bytes()?;
        let text = self
            .encoding
            .decode(&bytes)
            .map_err(|detail| InitError::ScriptEncoding {
                script: handle.name().to_string(),
                encoding: self.encoding,
                detail,
            })?;
        Ok(self.split_text(handle.name(), text))
    }

    /// Split already decoded script text
    pub fn split_text(&self, script: &str, text: impl Into<String>) -> Statements {
        Statements {
            script: Arc::from(script),
            text: text.into(),
            separator: self.separator.clone(),
            pos: 0,
            line: 1,
            mode: ScanMode::Normal,
            mode_line: 1,
            next_index: 0,
            finished: false,
        }
    }

    /// Eagerly split into a vector, stopping at the first error
    pub fn split_all(&self, script: &str, text: impl Into<String>) -> InitResult<Vec<Statement>> {
        self.split_text(script, text).collect()
    }
}

impl Default for ScriptSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR, ScriptEncoding::default())
    }
}

/// Lazy, single-pass statement sequence over one decoded script
#[derive(Debug)]
pub struct Statements {
    script: Arc<str>,
    text: String,
    separator: String,
    pos: usize,
    line: usize,
    mode: ScanMode,
    // Line on which the current quote/comment was opened
    mode_line: usize,
    next_index: usize,
    finished: bool,
}

impl Statements {
    fn emit(&mut self, buffer: &str, start_line: usize) -> Option<Statement> {
        let sql = buffer.trim();
        if sql.is_empty() {
            return None;
        }
        let statement = Statement {
            script: Arc::clone(&self.script),
            index: self.next_index,
            line: start_line,
            sql: sql.to_string(),
        };
        self.next_index += 1;
        Some(statement)
    }
}

impl Iterator for Statements {
    type Item = InitResult<Statement>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut buffer = String::new();
        let mut start_line: Option<usize> = None;

        while self.pos < self.text.len() {
            let rest = &self.text[self.pos..];
            let (next_mode, action) = self.mode.transition(rest, &self.separator);
            let consumed = &rest[..action.len()];

            match action {
                ScanAction::Keep(_) => {
                    if start_line.is_none() && !consumed.trim().is_empty() {
                        start_line = Some(self.line);
                    }
                    buffer.push_str(consumed);
                }
                ScanAction::Skip(_) => {
                    // A closed block comment still separates the tokens around it
                    if self.mode == ScanMode::BlockComment
                        && next_mode == ScanMode::Normal
                        && !buffer.is_empty()
                        && !buffer.ends_with(char::is_whitespace)
                    {
                        buffer.push(' ');
                    }
                }
                ScanAction::Break(_) => {}
            }

            if next_mode != self.mode && next_mode != ScanMode::Normal {
                self.mode_line = self.line;
            }
            self.line += consumed.matches('\n').count();
            self.pos += consumed.len();
            self.mode = next_mode;

            if let ScanAction::Break(_) = action {
                let line = start_line.unwrap_or(self.line);
                if let Some(statement) = self.emit(&buffer, line) {
                    return Some(Ok(statement));
                }
                buffer.clear();
                start_line = None;
            }
        }

        self.finished = true;

        if let Some(construct) = self.mode.unterminated() {
            return Some(Err(InitError::UnterminatedScript {
                script: self.script.to_string(),
                construct,
                line: self.mode_line,
            }));
        }

        let line = start_line.unwrap_or(self.line);
        self.emit(&buffer, line).map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(text: &str) -> Vec<String> {
        ScriptSplitter::default()
            .split_all("test.sql", text)
            .unwrap()
            .into_iter()
            .map(|s| s.sql)
            .collect()
    }

    #[test]
    fn test_transition_normal_mode() {
        use ScanAction::*;
        let m = ScanMode::Normal;
        assert_eq!(m.transition("; x", ";"), (ScanMode::Normal, Break(1)));
        assert_eq!(m.transition("'a'", ";"), (ScanMode::SingleQuoted, Keep(1)));
        assert_eq!(m.transition("\"a\"", ";"), (ScanMode::DoubleQuoted, Keep(1)));
        assert_eq!(m.transition("-- c", ";"), (ScanMode::LineComment, Skip(2)));
        assert_eq!(m.transition("/* c */", ";"), (ScanMode::BlockComment, Skip(2)));
        assert_eq!(m.transition("é", ";"), (ScanMode::Normal, Keep(2)));
        assert_eq!(m.transition("GO\n", "GO"), (ScanMode::Normal, Break(2)));
    }

    #[test]
    fn test_transition_quoted_modes() {
        use ScanAction::*;
        let s = ScanMode::SingleQuoted;
        assert_eq!(s.transition(";", ";"), (ScanMode::SingleQuoted, Keep(1)));
        assert_eq!(s.transition("\\'x", ";"), (ScanMode::SingleQuoted, Keep(2)));
        assert_eq!(s.transition("'", ";"), (ScanMode::Normal, Keep(1)));
        assert_eq!(s.transition("\"", ";"), (ScanMode::SingleQuoted, Keep(1)));

        let d = ScanMode::DoubleQuoted;
        assert_eq!(d.transition("'", ";"), (ScanMode::DoubleQuoted, Keep(1)));
        assert_eq!(d.transition("\"", ";"), (ScanMode::Normal, Keep(1)));
        assert_eq!(d.transition("--", ";"), (ScanMode::DoubleQuoted, Keep(1)));
    }

    #[test]
    fn test_transition_comment_modes() {
        use ScanAction::*;
        let l = ScanMode::LineComment;
        assert_eq!(l.transition("; x", ";"), (ScanMode::LineComment, Skip(1)));
        assert_eq!(l.transition("\nSELECT", ";"), (ScanMode::Normal, Skip(0)));

        let b = ScanMode::BlockComment;
        assert_eq!(b.transition(";", ";"), (ScanMode::BlockComment, Skip(1)));
        assert_eq!(b.transition("\n", ";"), (ScanMode::BlockComment, Skip(1)));
        assert_eq!(b.transition("*/", ";"), (ScanMode::Normal, Skip(2)));
    }

    #[test]
    fn test_separator_inside_literal_and_comment() {
        let statements =
            split("INSERT INTO t VALUES ('a;b'); -- comment ; here\nINSERT INTO t VALUES (2);");
        assert_eq!(
            statements,
            vec!["INSERT INTO t VALUES ('a;b')", "INSERT INTO t VALUES (2)"]
        );
    }

    #[test]
    fn test_separator_inside_double_quotes_and_block_comment() {
        let statements = split(
            "CREATE TABLE \"a;b\" (id INT); /* first; second */ SELECT 1; SELECT /*;*/ 2",
        );
        assert_eq!(
            statements,
            vec!["CREATE TABLE \"a;b\" (id INT)", "SELECT 1", "SELECT  2"]
        );
    }

    #[test]
    fn test_block_comment_between_tokens_keeps_them_apart() {
        assert_eq!(split("SELECT/*x*/1"), vec!["SELECT 1"]);
    }

    #[test]
    fn test_escaped_and_doubled_quotes() {
        let statements = split("INSERT INTO t VALUES ('it\\'s;'); INSERT INTO t VALUES ('a'';b')");
        assert_eq!(
            statements,
            vec![
                "INSERT INTO t VALUES ('it\\'s;')",
                "INSERT INTO t VALUES ('a'';b')"
            ]
        );
    }

    #[test]
    fn test_empty_statements_are_discarded() {
        let statements = ScriptSplitter::default()
            .split_all("s.sql", ";;\n  ;SELECT 1;; ;\n-- only a comment\n;SELECT 2")
            .unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].index, 0);
        assert_eq!(statements[0].sql, "SELECT 1");
        assert_eq!(statements[1].index, 1);
        assert_eq!(statements[1].sql, "SELECT 2");
    }

    #[test]
    fn test_multi_character_separator() {
        let splitter = ScriptSplitter::new("$$", ScriptEncoding::Utf8);
        let statements: Vec<String> = splitter
            .split_all("s.sql", "CREATE TRIGGER x BEGIN a; b; END$$SELECT '$$'$$")
            .unwrap()
            .into_iter()
            .map(|s| s.sql)
            .collect();
        assert_eq!(statements, vec!["CREATE TRIGGER x BEGIN a; b; END", "SELECT '$$'"]);
    }

    #[test]
    fn test_separator_is_case_sensitive() {
        let splitter = ScriptSplitter::new("GO", ScriptEncoding::Utf8);
        let statements = splitter
            .split_all("s.sql", "SELECT 'go' go\nGO\nSELECT 2")
            .unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].sql, "SELECT 'go' go");
    }

    #[test]
    fn test_newline_separator_after_line_comment() {
        let splitter = ScriptSplitter::new("\n", ScriptEncoding::Utf8);
        let statements = splitter
            .split_all("s.sql", "SELECT 1 -- one\nSELECT 2\n")
            .unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[1].sql, "SELECT 2");
    }

    #[test]
    fn test_line_numbers() {
        let statements = ScriptSplitter::default()
            .split_all("s.sql", "-- header\n\nCREATE TABLE a (\n  id INT\n);\n\nINSERT INTO a VALUES (1);")
            .unwrap();
        assert_eq!(statements[0].line, 3);
        assert_eq!(statements[1].line, 7);
        assert_eq!(&*statements[1].script, "s.sql");
    }

    #[test]
    fn test_unterminated_quote_fails() {
        let result = ScriptSplitter::default().split_all("bad.sql", "SELECT 1;\nSELECT 'oops;\n");
        match result {
            Err(InitError::UnterminatedScript {
                script,
                construct,
                line,
            }) => {
                assert_eq!(script, "bad.sql");
                assert_eq!(construct, Unterminated::SingleQuote);
                assert_eq!(line, 2);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_block_comment_fails_after_earlier_statements() {
        let mut statements = ScriptSplitter::default().split_text("bad.sql", "SELECT 1; /* never closed");
        assert_eq!(statements.next().unwrap().unwrap().sql, "SELECT 1");
        assert!(matches!(
            statements.next(),
            Some(Err(InitError::UnterminatedScript {
                construct: Unterminated::BlockComment,
                ..
            }))
        ));
        assert!(statements.next().is_none());
    }

    #[test]
    fn test_line_comment_at_end_of_file_is_fine() {
        assert_eq!(split("SELECT 1; -- trailing"), vec!["SELECT 1"]);
    }

    #[test]
    fn test_splitting_is_repeatable() {
        let text = "CREATE TABLE t (v TEXT); INSERT INTO t VALUES ('x;y'); /* c */ DELETE FROM t;";
        let splitter = ScriptSplitter::default();
        let first = splitter.split_all("a.sql", text).unwrap();
        let second = splitter.split_all("a.sql", text).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }
}

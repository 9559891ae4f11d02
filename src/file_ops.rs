//! File operation mini-language.
//!
//! | Command                                   | Effect                               |
//! |-------------------------------------------|--------------------------------------|
//! | `replace <term> with <replacement> in <f>` | literal replace-all inside `f`       |
//! | `move <from> to <to>`                     | copy contents to `to`, delete `from` |
//! | `delete <f>`                              | remove `f`                           |
//! | `append <content> to <f>`                 | append `content` verbatim            |
//! | `write <content> to <f>`                  | overwrite `f` with `content`         |
//!
//! Multi-word terms are single-quoted (see [`crate::lexer`]). The whole command
//! is parsed and checked before any file is touched.
//!
//! Nothing here locks files: sibling steps of a parallel fan-out touching the
//! same path race, and `move` is a read-write-delete sequence that can leave
//! both files behind if the delete fails.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use strum::{Display, EnumString};
use tracing::debug;

use crate::error::TaskError;
use crate::lexer::{Lexer, Token};

/// Verbs accepted as the first term of a file operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum FileVerb {
    Replace,
    Move,
    Delete,
    Append,
    Write,
}

impl FileVerb {
    /// Expected terms after the verb; `None` marks an argument slot, `Some` a keyword.
    fn grammar(self) -> &'static [Option<&'static str>] {
        match self {
            Self::Replace => &[None, Some("with"), None, Some("in"), None],
            Self::Move | Self::Append | Self::Write => &[None, Some("to"), None],
            Self::Delete => &[None],
        }
    }
}

/// A parsed, validated file operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOperation {
    Replace {
        term: String,
        replacement: String,
        path: PathBuf,
    },
    Move {
        from: PathBuf,
        to: PathBuf,
    },
    Delete {
        path: PathBuf,
    },
    Append {
        content: String,
        path: PathBuf,
    },
    Write {
        content: String,
        path: PathBuf,
    },
}

impl FileOperation {
    /// Parse a command string into an operation.
    pub fn parse(command: &str) -> Result<Self, TaskError> {
        let mut lexer = Lexer::new(command);
        let verb = match lexer.next_token()? {
            Token::EndOfInput => return Err(TaskError::UnexpectedEndOfInput),
            Token::Term(word) => word
                .parse::<FileVerb>()
                .map_err(|_| TaskError::UnsupportedOperation(word))?,
        };

        let mut args = read_arguments(verb, &mut lexer)?.into_iter();
        let mut next = || args.next().unwrap_or_default();

        Ok(match verb {
            FileVerb::Replace => Self::Replace {
                term: next(),
                replacement: next(),
                path: next().into(),
            },
            FileVerb::Move => Self::Move {
                from: next().into(),
                to: next().into(),
            },
            FileVerb::Delete => Self::Delete { path: next().into() },
            FileVerb::Append => Self::Append {
                content: next(),
                path: next().into(),
            },
            FileVerb::Write => Self::Write {
                content: next(),
                path: next().into(),
            },
        })
    }

    /// Perform the operation.
    pub fn apply(&self) -> Result<(), TaskError> {
        debug!("Applying file operation: {:?}", self);
        match self {
            Self::Replace {
                term,
                replacement,
                path,
            } => {
                let contents = fs::read_to_string(path).map_err(|e| fs_error(path, e))?;
                fs::write(path, replace_all(&contents, term, replacement))
                    .map_err(|e| fs_error(path, e))
            }
            Self::Move { from, to } => {
                let contents = fs::read(from).map_err(|e| fs_error(from, e))?;
                fs::write(to, contents).map_err(|e| fs_error(to, e))?;
                fs::remove_file(from).map_err(|e| fs_error(from, e))
            }
            Self::Delete { path } => fs::remove_file(path).map_err(|e| fs_error(path, e)),
            Self::Append { content, path } => OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .and_then(|mut file| file.write_all(content.as_bytes()))
                .map_err(|e| fs_error(path, e)),
            Self::Write { content, path } => {
                fs::write(path, content).map_err(|e| fs_error(path, e))
            }
        }
    }
}

/// Parse and run a file operation command.
pub fn execute(command: &str) -> Result<(), TaskError> {
    FileOperation::parse(command)?.apply()
}

/// Read exactly the verb's terms followed by end of input, then check keywords.
fn read_arguments(verb: FileVerb, lexer: &mut Lexer<'_>) -> Result<Vec<String>, TaskError> {
    let grammar = verb.grammar();
    let mut terms = Vec::with_capacity(grammar.len());
    while let Token::Term(term) = lexer.next_token()? {
        terms.push(term);
        if terms.len() > grammar.len() {
            break;
        }
    }
    if terms.len() != grammar.len() {
        return Err(TaskError::malformed(format!(
            "incorrect number of terms for '{}': expected {}, found {}",
            verb,
            grammar.len(),
            if terms.len() > grammar.len() {
                "more".to_string()
            } else {
                terms.len().to_string()
            }
        )));
    }

    let mut args = Vec::new();
    for (term, expected) in terms.into_iter().zip(grammar) {
        match expected {
            Some(keyword) if term != *keyword => {
                return Err(TaskError::malformed(format!(
                    "expected '{}' in '{}' operation, found '{}'",
                    keyword, verb, term
                )));
            }
            Some(_) => {}
            None => args.push(term),
        }
    }
    Ok(args)
}

/// Literal replace-all; an empty term leaves the text unchanged.
pub fn replace_all(value: &str, term: &str, replacement: &str) -> String {
    if term.is_empty() {
        return value.to_string();
    }
    value.replace(term, replacement)
}

fn fs_error(path: &Path, source: std::io::Error) -> TaskError {
    TaskError::FileSystem {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn path_str(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    #[test]
    fn test_replace_all() {
        assert_eq!(replace_all("Hello World!", "World", "All"), "Hello All!");
        assert_eq!(replace_all("Hello World!", "", "All"), "Hello World!");
        assert_eq!(replace_all("Hello World!", "World", ""), "Hello !");
        assert_eq!(replace_all("aaa", "a", "b"), "bbb");
    }

    #[test]
    fn test_parse_replace() {
        let op = FileOperation::parse("replace 'old text' with new in config.json").unwrap();
        assert_eq!(
            op,
            FileOperation::Replace {
                term: "old text".to_string(),
                replacement: "new".to_string(),
                path: PathBuf::from("config.json"),
            }
        );
    }

    #[test]
    fn test_empty_command() {
        assert!(matches!(
            FileOperation::parse(""),
            Err(TaskError::UnexpectedEndOfInput)
        ));
    }

    #[test]
    fn test_unsupported_verb() {
        assert!(matches!(
            FileOperation::parse("a fake command"),
            Err(TaskError::UnsupportedOperation(v)) if v == "a"
        ));
        assert!(matches!(
            FileOperation::parse("copy a to b"),
            Err(TaskError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_wrong_term_counts() {
        for command in [
            "write hello to",
            "write hello world to out.txt",
            "delete",
            "delete a b",
            "move a to",
            "replace a with b in",
            "replace a with b in f extra",
            "append x to f g",
        ] {
            match FileOperation::parse(command) {
                Err(TaskError::MalformedOperation(msg)) => {
                    assert!(msg.contains("incorrect number of terms"), "{}: {}", command, msg)
                }
                other => panic!("{}: expected MalformedOperation, got {:?}", command, other),
            }
        }
    }

    #[test]
    fn test_wrong_keyword() {
        assert!(matches!(
            FileOperation::parse("replace a by b in f"),
            Err(TaskError::MalformedOperation(msg)) if msg.contains("'with'")
        ));
    }

    #[test]
    fn test_malformed_command_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let target = path_str(&dir, "out.txt");
        assert!(execute(&format!("write hello to {} extra", target)).is_err());
        assert!(!dir.path().join("out.txt").exists());
    }

    #[test]
    fn test_write_and_append() {
        let dir = TempDir::new().unwrap();
        let target = path_str(&dir, "out.txt");

        execute(&format!("write hello to {}", target)).unwrap();
        execute(&format!("append world to {}", target)).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "helloworld");

        execute(&format!("write 'fresh start' to {}", target)).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "fresh start");
    }

    #[test]
    fn test_append_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let target = path_str(&dir, "new.txt");
        execute(&format!("append first to {}", target)).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "first");
    }

    #[test]
    fn test_replace_in_file() {
        let dir = TempDir::new().unwrap();
        let target = path_str(&dir, "f.txt");
        fs::write(&target, "name: OLD\nalias: OLD\n").unwrap();

        execute(&format!("replace OLD with 'new name' in {}", target)).unwrap();
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "name: new name\nalias: new name\n"
        );
    }

    #[test]
    fn test_replace_is_literal() {
        let dir = TempDir::new().unwrap();
        let target = path_str(&dir, "f.txt");
        fs::write(&target, "a.c abc").unwrap();
        execute(&format!("replace a.c with X in {}", target)).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "X abc");
    }

    #[test]
    fn test_move_and_delete() {
        let dir = TempDir::new().unwrap();
        let from = path_str(&dir, "a.txt");
        let to = path_str(&dir, "b.txt");
        fs::write(&from, "payload").unwrap();

        execute(&format!("move {} to {}", from, to)).unwrap();
        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "payload");

        execute(&format!("delete {}", to)).unwrap();
        assert!(!dir.path().join("b.txt").exists());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let missing = path_str(&dir, "missing.txt");
        match execute(&format!("delete {}", missing)) {
            Err(TaskError::FileSystem { path, .. }) => assert!(path.ends_with("missing.txt")),
            other => panic!("Expected FileSystem error, got {:?}", other),
        }
    }
}

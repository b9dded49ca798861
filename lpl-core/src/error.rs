use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Place a diagnostic points at, as the user sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Path or name of the source the diagnostic is about.
    pub source: String,
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
}

impl Location {
    /// Finds the line and column of a byte offset in `contents`.
    pub fn of(source: &str, contents: &str, offset: usize) -> Location {
        let offset = offset.min(contents.len());
        let mut line = 1;
        let mut column = 1;
        for ch in contents[..offset].chars() {
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Location {
            source: source.to_string(),
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.line, self.column)
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read source: {0}")]
    SourceIo(#[from] std::io::Error),
    #[error("could not find a source named `{name}` in the searched directories: {searched:?}")]
    MissingSource {
        name: String,
        searched: Vec<PathBuf>,
    },
    #[error("{location}: {message}")]
    LexError { location: Location, message: String },
    #[error("{location}: {message}")]
    ParseError { location: Location, message: String },
    #[error("{location}: {message}")]
    SemanticError { location: Location, message: String },
    #[error("{message}")]
    BuildError { message: String },
    #[error("could not record artifacts at {path:?}")]
    ArtifactError {
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },
}

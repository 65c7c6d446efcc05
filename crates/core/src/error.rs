use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::version::VersionTuple;

pub type GdResult<T> = Result<T, GdError>;

#[derive(Debug, Error, Diagnostic)]
pub enum GdError {
    #[error("project was saved with version {found}, which is too old to be opened")]
    #[diagnostic(
        code("gd.version_too_old"),
        help("open and re-save the project with an intermediate release first")
    )]
    VersionTooOld { found: VersionTuple },
    #[error("malformed project document: {0}")]
    #[diagnostic(code("gd.malformed_document"))]
    MalformedDocument(String),
    #[error("project document is not valid JSON: {message}")]
    #[diagnostic(code("gd.malformed_document"))]
    Syntax {
        message: String,
        #[source_code]
        src: String,
        #[label("here")]
        span: SourceSpan,
    },
    #[error("serialization error: {0}")]
    #[diagnostic(code("gd.serialization"))]
    Serialization(String),
    #[error("instruction catalog error: {0}")]
    #[diagnostic(code("gd.catalog"))]
    Catalog(String),
}

impl GdError {
    /// Builds a syntax error pointing at the offending line/column of `src`.
    pub(crate) fn syntax(err: &serde_json::Error, src: &str) -> Self {
        let offset = byte_offset(src, err.line(), err.column());
        GdError::Syntax {
            message: err.to_string(),
            src: src.to_string(),
            span: (offset, 0).into(),
        }
    }

    /// True for every error kind that belongs to the malformed-document family.
    pub fn is_malformed_document(&self) -> bool {
        matches!(
            self,
            GdError::MalformedDocument(_) | GdError::Syntax { .. }
        )
    }
}

fn byte_offset(src: &str, line: usize, column: usize) -> usize {
    if line == 0 {
        return 0;
    }
    let line_start: usize = src
        .split_inclusive('\n')
        .take(line - 1)
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(src.len())
}

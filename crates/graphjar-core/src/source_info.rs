use std::fmt;
use std::sync::Arc;

/// Location of a node in the source unit that produced it.
///
/// Lines and columns are 1-based. `line`/`column` mark the "main" position
/// (usually the element name) inside the `start..=end` span.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceInformation {
    pub source_id: Arc<str>,
    pub start_line: i32,
    pub start_column: i32,
    pub line: i32,
    pub column: i32,
    pub end_line: i32,
    pub end_column: i32,
}

impl SourceInformation {
    pub fn new(
        source_id: impl Into<Arc<str>>,
        start_line: i32,
        start_column: i32,
        line: i32,
        column: i32,
        end_line: i32,
        end_column: i32,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            start_line,
            start_column,
            line,
            column,
            end_line,
            end_column,
        }
    }

    /// Span covering a single line range, with the main position at the start.
    pub fn span(
        source_id: impl Into<Arc<str>>,
        start_line: i32,
        start_column: i32,
        end_line: i32,
        end_column: i32,
    ) -> Self {
        Self::new(
            source_id,
            start_line,
            start_column,
            start_line,
            start_column,
            end_line,
            end_column,
        )
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn is_from(&self, source_id: &str) -> bool {
        &*self.source_id == source_id
    }
}

impl fmt::Display for SourceInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}c{}-{}c{}",
            self.source_id, self.start_line, self.start_column, self.end_line, self.end_column
        )
    }
}

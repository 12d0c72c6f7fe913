use crate::lexer::Position;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("unterminated expression opened at {0}")]
    Unterminated(Position),
    #[error("unparseable token in expression at {pos}: {found:?}")]
    Unparseable { pos: Position, found: char },
    #[error("unterminated string literal at {0}")]
    UnterminatedString(Position),
    /// A lone `}` that is not part of a close marker.
    #[error("unexpected `}}` at {0}")]
    UnexpectedClose(Position),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("unexpected {found} at {pos}, expected {expected}")]
    Unexpected {
        pos: Position,
        found: String,
        expected: &'static str,
    },
    #[error("block `{open}` opened at {opened} closed by `/{close}` at {pos}")]
    MismatchedBlock {
        open: String,
        close: String,
        opened: Position,
        pos: Position,
    },
    #[error("block `{name}` opened at {pos} is never closed")]
    UnclosedBlock { name: String, pos: Position },
    #[error("closing `/{name}` at {pos} has no open block")]
    StrayClose { name: String, pos: Position },
    #[error("`else` at {0} outside of a block")]
    StrayElse(Position),
    #[error("second `else` at {0} in the same block")]
    DuplicateElse(Position),
    #[error("`{name}` at {pos} takes {expected} argument(s), got {found}")]
    Arity {
        name: String,
        pos: Position,
        expected: usize,
        found: usize,
    },
    #[error("expression opened at {0} closed with a different delimiter")]
    MismatchedDelimiters(Position),
    #[error("empty expression at {0}")]
    EmptyExpression(Position),
    #[error("unknown data variable `@{name}` at {pos}")]
    UnknownDataVariable { name: String, pos: Position },
    #[error("block `{name}` at {pos} is nested more than {limit} deep")]
    NestingTooDeep {
        name: String,
        pos: Position,
        limit: usize,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no helper named `{0}` is registered")]
    MissingHelper(String),
    #[error("no partial named `{0}` is registered")]
    MissingPartial(String),
    #[error("helper `{name}` failed: {message}")]
    Helper { name: String, message: String },
    #[error("data could not be converted: {0}")]
    Data(#[from] serde_json::Error),
    #[error("partial `{0}` exceeded the nesting limit of {1}")]
    PartialDepth(String, usize),
    #[error("writing to the output failed")]
    Write(#[from] std::fmt::Error),
}

impl RenderError {
    /// Convenience for helpers reporting their own failures.
    pub fn helper(name: impl Into<String>, message: impl Into<String>) -> Self {
        RenderError::Helper {
            name: name.into(),
            message: message.into(),
        }
    }
}

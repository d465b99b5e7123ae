use std::fmt::Display;

#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum Error {
    #[error("Grammar is empty, no productions supplied.")]
    EmptyInput,
    #[error("Malformed production, line: {line}, cause: {cause}.")]
    MalformedProduction {
        line: usize,
        cause: ParseProductionError,
    },
    #[error("Start symbol `{0}` has no productions.")]
    NoProductionsForStart(String),
    #[error("Resource limit exceeded: more than {limit} {resource}.")]
    ResourceLimitExceeded { resource: Resource, limit: u64 },
}

#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum ParseProductionError {
    #[error("no arrow in production line")]
    NoArrow,
    #[error("more than one arrow in production line")]
    MultipleArrows,
    #[error("production head is empty")]
    EmptyHead,
    #[error("production head `{0}` is not a single symbol")]
    InvalidHead(String),
    #[error("`{0}` is reserved and cannot be used here")]
    ReservedSymbol(String),
}

/// 分析过程中受限的资源.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Productions,
    Symbols,
    States,
    Milliseconds,
}

impl Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Self::Productions => "productions",
            Self::Symbols => "symbols",
            Self::States => "item set states",
            Self::Milliseconds => "milliseconds",
        })
    }
}

impl Error {
    pub(crate) fn malformed(line: usize, cause: ParseProductionError) -> Self {
        Self::MalformedProduction { line, cause }
    }

    pub(crate) fn limit(resource: Resource, limit: impl TryInto<u64>) -> Self {
        Self::ResourceLimitExceeded {
            resource,
            limit: limit.try_into().unwrap_or(u64::MAX),
        }
    }
}

/// 使用分析表驱动输入时的错误.
#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum DriveError {
    #[error("Unexpected terminal `{terminal}` in state {state}, position {position}.")]
    UnexpectedTerminal {
        state: usize,
        terminal: String,
        position: usize,
    },
    #[error("Table cell of state {state} on `{terminal}` is conflicted.")]
    Conflict { state: usize, terminal: String },
    #[error("Terminal `{0}` is not part of the grammar.")]
    UnknownTerminal(String),
}

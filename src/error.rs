use thiserror::Error;

/// Result type used across the ledger core.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while building or replaying a journal.
///
/// All of these classify malformed input; the first one aborts the whole
/// run, there is no partial-result mode.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid amount: `{0}'")]
    InvalidAmount(String),

    #[error("invalid date: `{0}'")]
    InvalidDate(String),

    #[error("transaction must have more than 1 posting")]
    InvalidTransaction,

    #[error("transaction postings don't sum to zero")]
    UnbalancedPostings,

    #[error("transaction with more than one elided amount")]
    MultipleOmittedAmounts,

    #[error("ambiguous postings (multiple sources and multiple destinations)")]
    AmbiguousPostings,

    #[error("incomplete promise: {0}")]
    IncompletePromise(&'static str),

    #[error("unknown event type: `{0}'")]
    UnknownEventType(String),
}

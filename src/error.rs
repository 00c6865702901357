//! Common error types.

use crate::wallet::Stage;

/// Cell engine error, returned by all `Store`/`Load` implementations.
pub use everscale_types::error::Error as CellError;

/// Error type for message construction errors.
///
/// Construction errors are fatal to the current attempt and are never
/// retried automatically.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// Cell engine rejected the layout (capacity, depth or invalid data).
    #[error(transparent)]
    Cell(#[from] CellError),
    /// Batch already contains the maximum number of messages.
    #[error("too many messages in a batch (max {max})")]
    BatchOverflow {
        /// Maximum number of messages for this batch kind.
        max: usize,
    },
    /// Tried to sign a batch without messages.
    #[error("batch is empty")]
    EmptyBatch,
    /// The same high-load batch index was assigned twice.
    #[error("duplicate batch index {0}")]
    DuplicateIndex(u16),
    /// High-load batch indices do not form a dense `0..N` range.
    #[error("batch index {0} leaves a gap")]
    SparseIndex(u16),
    /// Comment text does not fit into the allowed snake chain.
    #[error("comment is too long")]
    CommentTooLong,
    /// Cell does not contain a valid text comment.
    #[error("invalid comment")]
    InvalidComment,
    /// High-load v3 query id is out of range.
    #[error("invalid query id")]
    InvalidQueryId,
    /// All high-load v3 query ids of the timeout window were used.
    #[error("query ids are exhausted")]
    QueryIdOverflow,
    /// High-load v3 timeout does not fit into 22 bits.
    #[error("invalid timeout {0}")]
    InvalidTimeout(u32),
    /// Deployment was requested for a wallet created without code.
    #[error("state init of the wallet is unknown")]
    MissingStateInit,
    /// Signature check failed.
    #[error("invalid signature")]
    InvalidSignature,
    /// A stage of the transaction pipeline failed.
    #[error("transaction aborted at {stage}")]
    Aborted {
        /// Stage at which the attempt was aborted.
        stage: Stage,
        /// Underlying error.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wraps the error into [`Error::Aborted`] unless it is already wrapped.
    pub fn at(self, stage: Stage) -> Self {
        match self {
            Self::Aborted { .. } => self,
            other => Self::Aborted {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Returns the stage at which the attempt was aborted.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Aborted { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Error type for address parsing related errors.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ParseAddrError {
    /// Tried to parse an empty string.
    #[error("cannot parse address from an empty string")]
    Empty,
    /// Workchain id is too large.
    #[error("workchain id is too large to fit in target type")]
    InvalidWorkchain,
    /// Invalid account id hex.
    #[error("cannot parse account id")]
    InvalidAccountId,
    /// Too many address parts.
    #[error("unexpected address part")]
    UnexpectedPart,
}

/// Error type for remote reads (get methods, latest block).
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// Remote endpoint could not be reached or timed out.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    /// Get method finished with a non-zero exit code.
    #[error("get method `{method}` failed with exit code {exit_code}")]
    MethodFailed {
        /// Get method name.
        method: String,
        /// TVM exit code.
        exit_code: i32,
    },
    /// Get method returned an unexpected stack.
    #[error("unexpected response from get method `{0}`")]
    UnexpectedResponse(String),
}

/// Why the remote contract refused an external message.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RejectReason {
    /// Signature does not match the stored public key.
    InvalidSignature,
    /// Signed seqno differs from the stored counter.
    SeqnoMismatch,
    /// `valid_until` or the query id window has already passed.
    Expired,
    /// High-load query id was already processed.
    AlreadyProcessed,
    /// Any other rejection, as reported by the transport.
    Other(String),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSignature => f.write_str("invalid signature"),
            Self::SeqnoMismatch => f.write_str("seqno mismatch"),
            Self::Expired => f.write_str("message expired"),
            Self::AlreadyProcessed => f.write_str("query already processed"),
            Self::Other(reason) => f.write_str(reason),
        }
    }
}

/// Error type for a whole send attempt.
///
/// Rejections are kept apart from transport failures: a rejected message
/// must be rebuilt with fresh state, a transport failure may be resent as is.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum SendError {
    /// Message could not be constructed.
    #[error(transparent)]
    Build(#[from] Error),
    /// Remote read or submission failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Remote contract refused the message.
    #[error("message rejected: {0}")]
    Rejected(RejectReason),
}

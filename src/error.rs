use thiserror::Error;

/// Error taxonomy for the engine, per the kinds enumerated in the design:
/// allocation, argument, I/O, corruption, graph structure, overflow, and
/// missing-optional-API failures. Kinds, not individual messages, are what
/// callers are expected to match on.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("allocation failed: {0}")]
    Allocation(String),

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("i/o error: {0}")]
    Compress(#[from] xz2::stream::Error),

    #[error("corrupt database: {0}")]
    Corruption(String),

    #[error("tier graph structure error: {0}")]
    GraphStructure(String),

    #[error("bit-width or dictionary capacity exceeded: {0}")]
    Overflow(String),

    #[error("required game API not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("solved record mismatched reference database at {0:?}: {1}")]
    Discrepancy(crate::tier::TierPosition, String),

    #[error("a solving tier is already in progress")]
    AlreadySolving,
}

pub type Result<T> = std::result::Result<T, EngineError>;

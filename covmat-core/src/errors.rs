use thiserror::Error;

/// Errors raised by an alignment source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Can't open alignment source {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Failed to read alignments for {sequence}: {reason}")]
    Read { sequence: String, reason: String },

    #[error("Reference sequence not found in alignment source: {0}")]
    UnknownSequence(String),
}

/// Errors raised while writing or reading a coverage store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Not a coverage store: {0}")]
    InvalidStore(String),

    #[error("Corrupted coverage store: {0}")]
    Corrupt(String),

    #[error("Coverage store is not open")]
    NotOpen,

    #[error("Group already exists in store: {0}")]
    DuplicateGroup(String),

    #[error("Sequence not found in store: {0}")]
    MissingSequence(String),

    #[error("Member '{member}' not found for sequence {sequence}")]
    MissingArray { sequence: String, member: String },

    #[error("No sequence selected")]
    NoSequenceSelected,

    #[error("No array selected")]
    NoArraySelected,

    #[error("Requested range {start}+{count} exceeds array length {len}")]
    OutOfBounds { start: u64, count: u64, len: u64 },
}

impl StoreError {
    ///
    /// Whether the error means the store itself is unusable, as opposed to a
    /// single sequence, member or range being unavailable.
    ///
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::Io(_)
                | StoreError::InvalidStore(_)
                | StoreError::Corrupt(_)
                | StoreError::NotOpen
        )
    }
}

/// A feature line that can't be turned into a [crate::models::FeatureRecord].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FeatureParseError {
    #[error("Expected {expected} tab-separated fields, found {found}")]
    TooFewFields { expected: usize, found: usize },

    #[error("Invalid {field} coordinate: {value}")]
    InvalidCoordinate { field: &'static str, value: String },

    #[error("End {end} is before start {start}")]
    InvertedInterval { start: u64, end: u64 },
}

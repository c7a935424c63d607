use crate::errors::{SourceError, StoreError};
use crate::models::{AlignmentInterval, CoverageRecord, ReferenceSequence};

/// Stream of decoded alignments for one reference sequence.
pub type Alignments<'a> = Box<dyn Iterator<Item = Result<AlignmentInterval, SourceError>> + 'a>;

///
/// An open handle on a set of alignments that can be queried one reference
/// sequence at a time. Only mapped alignments are ever yielded.
///
pub trait AlignmentSource {
    ///
    /// All alignments placed on `sequence`.
    ///
    fn alignments(&mut self, sequence: &ReferenceSequence) -> Result<Alignments<'_>, SourceError>;
}

///
/// Opens independent [AlignmentSource] handles, one per worker, and reports the
/// reference sequences they cover.
///
pub trait AlignmentSourceFactory: Sync {
    type Source: AlignmentSource;

    ///
    /// Reference sequences in the order they should be written to the store.
    ///
    fn reference_sequences(&self) -> Result<Vec<ReferenceSequence>, SourceError>;

    fn open(&self) -> Result<Self::Source, SourceError>;
}

///
/// Destination for finished coverage records. Records arrive one at a time from a
/// single thread, in submission order.
///
pub trait CoverageSink {
    fn write_record(&mut self, record: &CoverageRecord) -> Result<(), StoreError>;
}

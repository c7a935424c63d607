use covmat_core::SourceError;
use covmat_core::models::{AlignmentInterval, CoverageRecord, ReferenceSequence};

///
/// Accumulates depth, clip-end and primary-read counts for one reference sequence.
///
pub struct MatrixBuilder {
    sequence: ReferenceSequence,
    depth: Vec<u32>,
    clip_ends: Vec<u32>,
    unique_read_count: u32,
}

impl MatrixBuilder {
    ///
    /// Start a builder with freshly allocated matrices.
    ///
    pub fn new(sequence: ReferenceSequence) -> Self {
        Self::with_buffers(sequence, Vec::new(), Vec::new())
    }

    ///
    /// Start a builder on recycled buffers. The buffers are cleared and resized to the
    /// sequence length, so whatever they held before is irrelevant.
    ///
    pub fn with_buffers(
        sequence: ReferenceSequence,
        mut depth: Vec<u32>,
        mut clip_ends: Vec<u32>,
    ) -> Self {
        depth.clear();
        depth.resize(sequence.length, 0);
        clip_ends.clear();
        clip_ends.resize(sequence.length, 0);

        MatrixBuilder {
            sequence,
            depth,
            clip_ends,
            unique_read_count: 0,
        }
    }

    pub fn sequence(&self) -> &ReferenceSequence {
        &self.sequence
    }

    ///
    /// Add a single alignment to the matrices.
    ///
    pub fn add(&mut self, alignment: &AlignmentInterval) {
        let length = self.sequence.length;

        for depth in &mut self.depth[alignment.depth_span(length)] {
            *depth = depth.saturating_add(1);
        }

        if alignment.leading_clip > 0 {
            if let Some(pos) = in_range(alignment.start, length) {
                self.clip_ends[pos] = self.clip_ends[pos].saturating_add(alignment.leading_clip);
            }
        }
        if alignment.trailing_clip > 0 {
            if let Some(pos) = in_range(alignment.end, length) {
                self.clip_ends[pos] = self.clip_ends[pos].saturating_add(alignment.trailing_clip);
            }
        }

        if alignment.is_primary {
            self.unique_read_count = self.unique_read_count.saturating_add(1);
        }
    }

    pub fn finish(self) -> CoverageRecord {
        CoverageRecord {
            name: self.sequence.name,
            length: self.sequence.length,
            unique_read_count: self.unique_read_count,
            depth: self.depth,
            clip_ends: self.clip_ends,
        }
    }

    ///
    /// Consume an entire alignment stream.
    ///
    /// A read failure anywhere in the stream abandons the sequence: the error is
    /// returned along with the buffers so the caller can recycle them.
    ///
    pub fn build<I>(
        mut self,
        alignments: I,
    ) -> Result<CoverageRecord, (SourceError, Vec<u32>, Vec<u32>)>
    where
        I: IntoIterator<Item = Result<AlignmentInterval, SourceError>>,
    {
        for alignment in alignments {
            match alignment {
                Ok(alignment) => self.add(&alignment),
                Err(err) => return Err((err, self.depth, self.clip_ends)),
            }
        }

        Ok(self.finish())
    }
}

fn in_range(pos: i64, length: usize) -> Option<usize> {
    if pos >= 0 && (pos as u64) < length as u64 {
        Some(pos as usize)
    } else {
        None
    }
}

///
/// Build a record for `sequence` from an in-memory alignment list.
///
pub fn build_record(sequence: &ReferenceSequence, alignments: &[AlignmentInterval]) -> CoverageRecord {
    let mut builder = MatrixBuilder::new(sequence.clone());
    for alignment in alignments {
        builder.add(alignment);
    }
    builder.finish()
}

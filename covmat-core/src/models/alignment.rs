///
/// A reference sequence as announced by an alignment source.
///
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
pub struct ReferenceSequence {
    pub name: String,
    pub length: usize,
}

impl ReferenceSequence {
    pub fn new<S: Into<String>>(name: S, length: usize) -> Self {
        ReferenceSequence {
            name: name.into(),
            length,
        }
    }
}

///
/// One mapped alignment on a reference sequence.
///
/// `start` is the 0-based alignment start and `end` the exclusive end on the
/// reference. Clip lengths are zero when that end of the read is not soft-clipped.
///
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct AlignmentInterval {
    pub start: i64,
    pub end: i64,
    pub leading_clip: u32,
    pub trailing_clip: u32,
    pub is_primary: bool,
}

impl AlignmentInterval {
    ///
    /// An unclipped primary alignment covering `start..end`.
    ///
    pub fn primary(start: i64, end: i64) -> Self {
        AlignmentInterval {
            start,
            end,
            leading_clip: 0,
            trailing_clip: 0,
            is_primary: true,
        }
    }

    pub fn with_clips(mut self, leading_clip: u32, trailing_clip: u32) -> Self {
        self.leading_clip = leading_clip;
        self.trailing_clip = trailing_clip;
        self
    }

    pub fn secondary(mut self) -> Self {
        self.is_primary = false;
        self
    }

    ///
    /// Array positions whose depth this alignment increments on a sequence of
    /// `length` bases.
    ///
    /// The lower bound is shifted one position inward (`min(start, end) - 1`) while
    /// the upper bound is not; existing matrices depend on this exact arithmetic.
    ///
    pub fn depth_span(&self, length: usize) -> std::ops::Range<usize> {
        let length = length as i64;
        let lo = (self.start.min(self.end) - 1).max(0);
        let hi = self.start.max(self.end).min(length);

        if hi <= lo {
            return 0..0;
        }
        lo as usize..hi as usize
    }
}

///
/// Per-sequence coverage: the unit a coverage store persists, one group per record.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageRecord {
    pub name: String,
    pub length: usize,
    pub unique_read_count: u32,
    pub depth: Vec<u32>,
    pub clip_ends: Vec<u32>,
}

impl CoverageRecord {
    ///
    /// An all-zero record for a sequence of `length` bases.
    ///
    pub fn empty<S: Into<String>>(name: S, length: usize) -> Self {
        CoverageRecord {
            name: name.into(),
            length,
            unique_read_count: 0,
            depth: vec![0; length],
            clip_ends: vec![0; length],
        }
    }

    ///
    /// Give back the two matrices so their allocations can be reused.
    ///
    pub fn into_buffers(self) -> (Vec<u32>, Vec<u32>) {
        (self.depth, self.clip_ends)
    }
}

///
/// Coverage summary of one feature in one sample.
///
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeatureCoverageStat {
    pub average_depth: f32,
    pub covered_bases: u64,
    pub covered_fraction: f32,
}

impl FeatureCoverageStat {
    ///
    /// Summarise a window of depth values.
    ///
    /// # Arguments
    /// - depths: per-base depth over the feature
    /// - min_depth: depth at or above which a base counts as covered
    ///
    pub fn from_depths(depths: &[u32], min_depth: u32) -> Self {
        if depths.is_empty() {
            return FeatureCoverageStat::default();
        }

        let mut total: u64 = 0;
        let mut covered: u64 = 0;
        for &depth in depths {
            if depth >= min_depth {
                covered += 1;
            }
            total += depth as u64;
        }

        let len = depths.len() as f64;
        FeatureCoverageStat {
            average_depth: (total as f64 / len) as f32,
            covered_bases: covered,
            covered_fraction: (covered as f64 / len) as f32,
        }
    }
}

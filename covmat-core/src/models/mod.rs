pub mod alignment;
pub mod coverage;
pub mod feature;

// re-export for cleaner imports
pub use self::alignment::{AlignmentInterval, ReferenceSequence};
pub use self::coverage::{CoverageRecord, FeatureCoverageStat};
pub use self::feature::FeatureRecord;

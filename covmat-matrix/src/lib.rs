//! # Coverage matrix construction
//!
//! Turns a stream of mapped alignments into one [CoverageRecord](covmat_core::models::CoverageRecord)
//! per reference sequence. [builder::MatrixBuilder] handles a single sequence;
//! [scheduler::BatchScheduler] runs builders in fixed-size batches on a `rayon` pool and hands the
//! results to a [CoverageSink](covmat_core::CoverageSink) in submission order.
//!
//! A BAM-backed alignment source lives in [bam].
//!
pub mod bam;
pub mod builder;
pub mod pool;
pub mod scheduler;

pub mod consts {
    pub const DEFAULT_WORKERS: usize = 8;
    /// Idle buffer pairs kept per worker between batches.
    pub const POOL_BUFFERS_PER_WORKER: usize = 2;
}

// re-exports
pub use bam::*;
pub use builder::*;
pub use pool::*;
pub use scheduler::*;

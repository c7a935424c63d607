use indicatif::ProgressBar;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use thiserror::Error;

use covmat_core::models::{CoverageRecord, ReferenceSequence};
use covmat_core::{AlignmentSource, AlignmentSourceFactory, CoverageSink, SourceError, StoreError};

use crate::builder::MatrixBuilder;
use crate::consts::POOL_BUFFERS_PER_WORKER;
use crate::pool::MatrixPool;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Worker count must be at least 1")]
    InvalidWorkerCount,

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to write {sequence} to the coverage store: {source}")]
    Sink {
        sequence: String,
        #[source]
        source: StoreError,
    },
}

/// What happened to the sequences handed to [BatchScheduler::run].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    /// Records accepted by the sink.
    pub written: usize,
    /// Sequences dropped because their alignments couldn't be read.
    pub skipped: usize,
    /// Records the sink refused (e.g. duplicate names).
    pub rejected: usize,
}

type TaskResult = Result<CoverageRecord, (SourceError, Vec<u32>, Vec<u32>)>;

///
/// Runs one [MatrixBuilder] per reference sequence, `workers` at a time.
///
/// Batches are strict epochs: every task of a batch must finish before any of its records
/// reach the sink, and the sink sees them in submission order. Peak memory is therefore
/// bounded by the `workers` largest sequences in flight.
///
pub struct BatchScheduler {
    workers: usize,
    pool: MatrixPool,
    progress: Option<ProgressBar>,
}

impl BatchScheduler {
    pub fn new(workers: usize) -> Result<Self, ScheduleError> {
        if workers == 0 {
            return Err(ScheduleError::InvalidWorkerCount);
        }

        Ok(BatchScheduler {
            workers,
            pool: MatrixPool::new(workers * POOL_BUFFERS_PER_WORKER),
            progress: None,
        })
    }

    ///
    /// Tick `bar` once per sequence processed.
    ///
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    ///
    /// Build and store coverage for every sequence.
    ///
    /// # Arguments
    /// - sequences: reference sequences, in the order they should be stored
    /// - factory: opens a private alignment source for each task
    /// - sink: receives finished records, one at a time
    ///
    pub fn run<F, S>(
        &mut self,
        sequences: &[ReferenceSequence],
        factory: &F,
        sink: &mut S,
    ) -> Result<BatchSummary, ScheduleError>
    where
        F: AlignmentSourceFactory,
        S: CoverageSink,
    {
        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()?;

        let mut summary = BatchSummary::default();

        for (batch_idx, batch) in sequences.chunks(self.workers).enumerate() {
            debug!(
                "Starting batch {} with {} sequence(s)",
                batch_idx + 1,
                batch.len()
            );

            let builders: Vec<MatrixBuilder> = batch
                .iter()
                .map(|sequence| {
                    let (depth, clip_ends) = self.pool.take();
                    MatrixBuilder::with_buffers(sequence.clone(), depth, clip_ends)
                })
                .collect();

            // join barrier: collect() returns only once every task in the batch is done
            let results: Vec<TaskResult> = thread_pool.install(|| {
                builders
                    .into_par_iter()
                    .map(|builder| run_task(factory, builder))
                    .collect()
            });

            for (sequence, result) in batch.iter().zip(results) {
                self.flush(sequence, result, sink, &mut summary)?;
                if let Some(bar) = &self.progress {
                    bar.inc(1);
                }
            }
        }

        info!(
            "Stored {} sequence(s); {} skipped, {} rejected",
            summary.written, summary.skipped, summary.rejected
        );

        Ok(summary)
    }

    fn flush<S: CoverageSink>(
        &mut self,
        sequence: &ReferenceSequence,
        result: TaskResult,
        sink: &mut S,
        summary: &mut BatchSummary,
    ) -> Result<(), ScheduleError> {
        let record = match result {
            Ok(record) => record,
            Err((err, depth, clip_ends)) => {
                warn!("Skipping {}: {}", sequence.name, err);
                self.pool.reclaim(depth, clip_ends);
                summary.skipped += 1;
                return Ok(());
            }
        };

        let written = sink.write_record(&record);
        let (depth, clip_ends) = record.into_buffers();
        self.pool.reclaim(depth, clip_ends);

        match written {
            Ok(()) => {
                summary.written += 1;
                Ok(())
            }
            Err(err) if err.is_fatal() => Err(ScheduleError::Sink {
                sequence: sequence.name.clone(),
                source: err,
            }),
            Err(err) => {
                error!("Record for {} was not stored: {}", sequence.name, err);
                summary.rejected += 1;
                Ok(())
            }
        }
    }
}

fn run_task<F: AlignmentSourceFactory>(factory: &F, builder: MatrixBuilder) -> TaskResult {
    let mut source = match factory.open() {
        Ok(source) => source,
        Err(err) => {
            let record = builder.finish();
            let (depth, clip_ends) = record.into_buffers();
            return Err((err, depth, clip_ends));
        }
    };

    match source.alignments(builder.sequence()) {
        Ok(alignments) => builder.build(alignments),
        Err(err) => {
            let (depth, clip_ends) = builder.finish().into_buffers();
            Err((err, depth, clip_ends))
        }
    }
}

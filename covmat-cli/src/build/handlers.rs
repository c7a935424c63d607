use anyhow::{Context, Result};
use clap::ArgMatches;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

use covmat_core::AlignmentSourceFactory;
use covmat_matrix::consts::DEFAULT_WORKERS;
use covmat_matrix::{BamSourceFactory, BatchScheduler};
use covmat_store::StoreWriter;

pub fn run_build(matches: &ArgMatches) -> Result<()> {
    let input = matches
        .get_one::<String>("input")
        .expect("A path to a BAM file is required.");

    let output = matches
        .get_one::<String>("output")
        .expect("A path for the coverage store is required.");

    let workers = matches
        .get_one::<usize>("threads")
        .copied()
        .unwrap_or(DEFAULT_WORKERS);

    let factory = BamSourceFactory::new(input)?;
    let sequences = factory
        .reference_sequences()
        .with_context(|| format!("Failed to read reference sequences from {input}"))?;

    if sequences.is_empty() {
        anyhow::bail!("No reference sequences found in {}", input);
    }
    info!(
        "Found {} reference sequences in {}",
        sequences.len(),
        factory.path().display()
    );

    // fail before any work if the store can't be created
    let mut store = StoreWriter::new(output);
    store
        .open()
        .with_context(|| format!("Failed to create coverage store {output}"))?;

    let bar = ProgressBar::new(sequences.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40} {pos}/{len} sequences")?,
    );

    let mut scheduler = BatchScheduler::new(workers)?.with_progress(bar.clone());
    info!("Counting coverage with {} worker(s)", scheduler.workers());
    let summary = scheduler.run(&sequences, &factory, &mut store)?;
    bar.finish_and_clear();

    store.finish()?;

    if summary.skipped > 0 || summary.rejected > 0 {
        warn!(
            "{} sequence(s) could not be read and {} were rejected by the store",
            summary.skipped, summary.rejected
        );
    }
    info!(
        "Wrote {} sequences to {}",
        summary.written,
        store.path().display()
    );

    Ok(())
}

//! # Per-feature coverage
//!
//! Reads the `BaseDepth` array of one or more coverage stores over every feature of a GFF-style
//! file and reports, per sample, the mean depth, the number of bases at or above a minimum
//! depth and the fraction of the feature they make up.
//!
//! Features are expected to be grouped by sequence; the aggregator only re-selects sequences
//! in the stores when the seqid changes.
//!
use std::io::{self, Write};
use std::path::Path;

use log::{debug, info, warn};
use thiserror::Error;

use covmat_core::StoreError;
use covmat_core::consts::BASE_DEPTH;
use covmat_core::models::{FeatureCoverageStat, FeatureRecord};
use covmat_store::CoverageReader;

pub mod consts {
    pub const DEFAULT_MIN_DEPTH: u32 = 5;
    pub const MISSING_VALUE: &str = "NA";
    pub const FEATURE_HEADER: &str = "#CHROM\tsource\ttype\tstart\tend\tscore\tstrand\tphase\tattributes";
}

use consts::{FEATURE_HEADER, MISSING_VALUE};

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Failed to write coverage report: {0}")]
    Output(#[from] io::Error),

    #[error("Coverage store for sample {sample} is unusable: {source}")]
    Store {
        sample: String,
        #[source]
        source: StoreError,
    },
}

///
/// A coverage store opened under a sample name.
///
pub struct Sample {
    pub name: String,
    pub reader: CoverageReader,
}

impl Sample {
    pub fn new<S: Into<String>>(name: S, reader: CoverageReader) -> Self {
        Sample {
            name: name.into(),
            reader,
        }
    }

    ///
    /// Open a store, naming the sample after the file stem.
    ///
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Sample::new(name, CoverageReader::open_path(path)?))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateSummary {
    /// Rows written.
    pub features: usize,
    /// Sample columns written as missing.
    pub skipped_stats: usize,
}

pub fn write_header<W: Write>(out: &mut W, samples: &[Sample]) -> io::Result<()> {
    write!(out, "{FEATURE_HEADER}")?;
    for sample in samples {
        write!(
            out,
            "\t{0}.avgDepth\t{0}.coveredBases\t{0}.coveredFrac",
            sample.name
        )?;
    }
    writeln!(out)
}

///
/// Coverage of `feature` in the currently selected array of `reader`.
///
/// The feature's 1-based start is used as the offset into the array.
///
pub fn feature_stats(
    reader: &mut CoverageReader,
    feature: &FeatureRecord,
    min_depth: u32,
    buffer: &mut Vec<u32>,
) -> Result<FeatureCoverageStat, StoreError> {
    let count = feature.len();
    let len = reader.selected_array_len()?;

    // check before sizing the buffer
    if feature.start.checked_add(count).is_none_or(|end| end > len) {
        return Err(StoreError::OutOfBounds {
            start: feature.start,
            count,
            len,
        });
    }

    buffer.clear();
    buffer.resize(count as usize, 0);

    reader.read_range(feature.start, buffer)?;
    Ok(FeatureCoverageStat::from_depths(buffer, min_depth))
}

///
/// Write a coverage report for `features` over every sample.
///
/// A sample missing the feature's sequence, or whose depth array doesn't reach the
/// feature, gets `NA` columns for that row. Store errors that leave the file unusable
/// stop the run.
///
/// # Arguments
/// - samples: opened stores, one report column triple each
/// - features: features to summarise, ideally grouped by seqid
/// - min_depth: depth at or above which a base counts as covered
/// - out: destination for the header and rows
///
pub fn aggregate<W: Write>(
    samples: &mut [Sample],
    features: &[FeatureRecord],
    min_depth: u32,
    out: &mut W,
) -> Result<AggregateSummary, AggregateError> {
    write_header(out, samples)?;

    let mut summary = AggregateSummary::default();
    let mut current_seqid: Option<&str> = None;
    let mut healthy = vec![false; samples.len()];
    let mut buffer = Vec::new();

    for feature in features {
        if current_seqid != Some(feature.seqid.as_str()) {
            debug!("Switching to sequence {}", feature.seqid);
            for (sample, ok) in samples.iter_mut().zip(healthy.iter_mut()) {
                *ok = select_depth(sample, &feature.seqid)?;
            }
            current_seqid = Some(feature.seqid.as_str());
        }

        write!(out, "{feature}")?;

        for (sample, ok) in samples.iter_mut().zip(healthy.iter()) {
            let stat = if *ok {
                match feature_stats(&mut sample.reader, feature, min_depth, &mut buffer) {
                    Ok(stat) => Some(stat),
                    Err(err) if err.is_fatal() => {
                        return Err(AggregateError::Store {
                            sample: sample.name.clone(),
                            source: err,
                        });
                    }
                    Err(err) => {
                        debug!("{}: {}", sample.name, err);
                        None
                    }
                }
            } else {
                None
            };

            match stat {
                Some(stat) => write!(
                    out,
                    "\t{}\t{}\t{}",
                    stat.average_depth, stat.covered_bases, stat.covered_fraction
                )?,
                None => {
                    summary.skipped_stats += 1;
                    write!(out, "\t{MISSING_VALUE}\t{MISSING_VALUE}\t{MISSING_VALUE}")?
                }
            }
        }

        writeln!(out)?;
        summary.features += 1;
    }

    out.flush()?;
    info!(
        "Summarised {} features over {} samples ({} missing values)",
        summary.features,
        samples.len(),
        summary.skipped_stats
    );

    Ok(summary)
}

fn select_depth(sample: &mut Sample, seqid: &str) -> Result<bool, AggregateError> {
    let selected = sample
        .reader
        .select_sequence(seqid)
        .and_then(|_| sample.reader.select_array(BASE_DEPTH));

    match selected {
        Ok(()) => Ok(true),
        Err(err) if err.is_fatal() => Err(AggregateError::Store {
            sample: sample.name.clone(),
            source: err,
        }),
        Err(err) => {
            warn!("Sample {}: {}", sample.name, err);
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    use covmat_core::models::CoverageRecord;
    use covmat_store::StoreWriter;

    fn depth_record(name: &str, depth: Vec<u32>) -> CoverageRecord {
        let length = depth.len();
        CoverageRecord {
            name: name.to_string(),
            length,
            unique_read_count: 0,
            depth,
            clip_ends: vec![0; length],
        }
    }

    fn write_store(dir: &TempDir, file: &str, records: &[CoverageRecord]) -> PathBuf {
        let path = dir.path().join(file);
        let mut writer = StoreWriter::new(&path);
        for record in records {
            writer.write_record(record).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    fn feature(line: &str) -> FeatureRecord {
        line.parse().unwrap()
    }

    #[fixture]
    fn samples() -> (TempDir, Vec<Sample>) {
        let dir = tempdir().unwrap();
        let a = write_store(
            &dir,
            "a.cvmx",
            &[
                depth_record("chr1", vec![0, 1, 1, 1, 1, 1, 0, 0, 0, 0]),
                depth_record("chr2", vec![5; 6]),
            ],
        );
        let b = write_store(
            &dir,
            "b.cvmx",
            &[depth_record("chr1", vec![2, 2, 2, 2, 2, 2, 2, 2, 2, 2])],
        );

        let samples = vec![Sample::open(a).unwrap(), Sample::open(b).unwrap()];
        (dir, samples)
    }

    fn run(samples: &mut [Sample], features: &[FeatureRecord], min_depth: u32) -> (String, AggregateSummary) {
        let mut out = Vec::new();
        let summary = aggregate(samples, features, min_depth, &mut out).unwrap();
        (String::from_utf8(out).unwrap(), summary)
    }

    #[rstest]
    fn test_header_names_samples(samples: (TempDir, Vec<Sample>)) {
        let (_dir, samples) = samples;
        let mut out = Vec::new();
        write_header(&mut out, &samples).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "#CHROM\tsource\ttype\tstart\tend\tscore\tstrand\tphase\tattributes\
             \ta.avgDepth\ta.coveredBases\ta.coveredFrac\
             \tb.avgDepth\tb.coveredBases\tb.coveredFrac\n"
        );
    }

    #[rstest]
    fn test_feature_window(samples: (TempDir, Vec<Sample>)) {
        let (_dir, mut samples) = samples;
        let features = vec![feature("chr1\tsrc\texon\t3\t7\t.\t+\t.\tID=e1")];

        let (report, summary) = run(&mut samples[..1], &features, 1);
        let row = report.lines().nth(1).unwrap();

        assert_eq!(row, "chr1\tsrc\texon\t3\t7\t.\t+\t.\tID=e1\t0.6\t3\t0.6");
        assert_eq!(summary, AggregateSummary { features: 1, skipped_stats: 0 });
    }

    #[rstest]
    fn test_missing_sequence_is_na(samples: (TempDir, Vec<Sample>)) {
        let (_dir, mut samples) = samples;
        let features = vec![
            feature("chr2\tsrc\tgene\t1\t4\t.\t-\t.\tID=g2"),
            feature("chr1\tsrc\tgene\t0\t1\t.\t+\t.\tID=g1"),
        ];

        let (report, summary) = run(&mut samples, &features, 5);
        let rows: Vec<&str> = report.lines().skip(1).collect();

        assert_eq!(rows[0], "chr2\tsrc\tgene\t1\t4\t.\t-\t.\tID=g2\t5\t4\t1\tNA\tNA\tNA");
        assert_eq!(rows[1], "chr1\tsrc\tgene\t0\t1\t.\t+\t.\tID=g1\t0.5\t0\t0\t2\t0\t0");
        assert_eq!(summary.skipped_stats, 1);
    }

    #[rstest]
    fn test_out_of_bounds_feature_is_na(samples: (TempDir, Vec<Sample>)) {
        let (_dir, mut samples) = samples;
        let features = vec![
            feature("chr1\tsrc\tgene\t8\t12\t.\t+\t.\tID=late"),
            feature("chr1\tsrc\tgene\t1\t2\t.\t+\t.\tID=early"),
        ];

        let (report, summary) = run(&mut samples, &features, 1);
        let rows: Vec<&str> = report.lines().skip(1).collect();

        assert!(rows[0].ends_with("\tNA\tNA\tNA\tNA\tNA\tNA"));
        // the next feature on the same sequence is unaffected
        assert_eq!(rows[1], "chr1\tsrc\tgene\t1\t2\t.\t+\t.\tID=early\t1\t2\t1\t2\t2\t1");
        assert_eq!(summary, AggregateSummary { features: 2, skipped_stats: 2 });
    }

    #[rstest]
    #[case("chr1\tsrc\tgene\t1\t4000000000000\t.\t+\t.\tID=huge")]
    #[case("chr1\tsrc\tgene\t0\t18446744073709551615\t.\t+\t.\tID=all")]
    #[case("chr1\tsrc\tgene\t18446744073709551615\t18446744073709551615\t.\t+\t.\tID=last")]
    fn test_feature_far_past_sequence_is_na(samples: (TempDir, Vec<Sample>), #[case] line: &str) {
        let (_dir, mut samples) = samples;
        let features = vec![feature(line)];

        let (report, summary) = run(&mut samples, &features, 1);
        let row = report.lines().nth(1).unwrap();

        assert!(row.ends_with("\tNA\tNA\tNA\tNA\tNA\tNA"));
        assert_eq!(summary, AggregateSummary { features: 1, skipped_stats: 2 });
    }

    #[rstest]
    fn test_oversized_feature_is_rejected_before_reading(samples: (TempDir, Vec<Sample>)) {
        let (_dir, mut samples) = samples;
        let huge = feature("chr1\tsrc\tgene\t1\t4000000000000\t.\t+\t.\tID=huge");
        let mut buffer = Vec::new();

        let sample = &mut samples[0];
        sample.reader.select_sequence("chr1").unwrap();
        sample.reader.select_array(BASE_DEPTH).unwrap();
        let err = feature_stats(&mut sample.reader, &huge, 1, &mut buffer).unwrap_err();

        assert!(matches!(err, StoreError::OutOfBounds { start: 1, len: 10, .. }));
        assert!(buffer.is_empty());
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(3)]
    #[case(100)]
    fn test_covered_fraction_bounds(samples: (TempDir, Vec<Sample>), #[case] min_depth: u32) {
        let (_dir, mut samples) = samples;
        let target = feature("chr1\tsrc\tgene\t0\t9\t.\t+\t.\tID=all");
        let mut buffer = Vec::new();

        let sample = &mut samples[0];
        sample.reader.select_sequence("chr1").unwrap();
        sample.reader.select_array(BASE_DEPTH).unwrap();
        let stat = feature_stats(&mut sample.reader, &target, min_depth, &mut buffer).unwrap();

        assert!((0.0..=1.0).contains(&stat.covered_fraction));
        if min_depth == 0 {
            assert_eq!(stat.covered_fraction, 1.0);
            assert_eq!(stat.covered_bases, 10);
        }
    }

    #[rstest]
    fn test_no_features_writes_header_only(samples: (TempDir, Vec<Sample>)) {
        let (_dir, mut samples) = samples;
        let (report, summary) = run(&mut samples, &[], 5);

        assert_eq!(report.lines().count(), 1);
        assert_eq!(summary, AggregateSummary::default());
    }
}

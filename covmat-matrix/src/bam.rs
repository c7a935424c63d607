use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use noodles::bam;
use noodles::bam::bai;
use noodles::bgzf;
use noodles::core::Region;
use noodles::csi::binning_index::Indexer;
use noodles::csi::binning_index::index::reference_sequence::bin::Chunk;
use noodles::csi::binning_index::index::reference_sequence::index::LinearIndex;
use noodles::sam;
use noodles::sam::alignment::Record as _;
use noodles::sam::alignment::record::cigar::op::Kind;

use covmat_core::consts::BAI_FILE_EXTENSION;
use covmat_core::models::{AlignmentInterval, ReferenceSequence};
use covmat_core::{AlignmentSource, AlignmentSourceFactory, Alignments, SourceError};

///
/// Opens indexed BAM readers on one file, one per worker.
///
/// The index is read from a `.bai` next to the BAM, or built once in memory when there is
/// none, and shared with every reader the factory opens.
///
pub struct BamSourceFactory {
    path: PathBuf,
    index: bai::Index,
}

impl BamSourceFactory {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();

        File::open(&path).map_err(|err| open_error(&path, err))?;

        let index = match find_index(&path) {
            Some(bai_path) => {
                info!("Using BAM index {}", bai_path.display());
                bai::read(&bai_path).map_err(|err| open_error(&bai_path, err))?
            }
            None => {
                warn!(
                    "No index found for {}; building one in memory",
                    path.display()
                );
                build_index(&path).map_err(|err| open_error(&path, err))?
            }
        };

        Ok(BamSourceFactory { path, index })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AlignmentSourceFactory for BamSourceFactory {
    type Source = BamAlignmentSource;

    fn reference_sequences(&self) -> Result<Vec<ReferenceSequence>, SourceError> {
        let mut reader = bam::io::reader::Builder::default()
            .build_from_path(&self.path)
            .map_err(|err| open_error(&self.path, err))?;
        let header = reader
            .read_header()
            .map_err(|err| open_error(&self.path, err))?;

        Ok(header
            .reference_sequences()
            .iter()
            .map(|(name, reference_sequence)| {
                ReferenceSequence::new(name.to_string(), usize::from(reference_sequence.length()))
            })
            .collect())
    }

    fn open(&self) -> Result<Self::Source, SourceError> {
        let mut reader = bam::io::indexed_reader::Builder::default()
            .set_index(self.index.clone())
            .build_from_path(&self.path)
            .map_err(|err| open_error(&self.path, err))?;
        let header = reader
            .read_header()
            .map_err(|err| open_error(&self.path, err))?;

        Ok(BamAlignmentSource { reader, header })
    }
}

///
/// A single indexed BAM reader.
///
pub struct BamAlignmentSource {
    reader: bam::io::IndexedReader<bgzf::Reader<File>>,
    header: sam::Header,
}

impl AlignmentSource for BamAlignmentSource {
    fn alignments(&mut self, sequence: &ReferenceSequence) -> Result<Alignments<'_>, SourceError> {
        if !self
            .header
            .reference_sequences()
            .contains_key(sequence.name.as_bytes())
        {
            return Err(SourceError::UnknownSequence(sequence.name.clone()));
        }

        let region = Region::new(sequence.name.as_str(), ..);
        let name = sequence.name.clone();

        let query = self
            .reader
            .query(&self.header, &region)
            .map_err(|err| read_error(&name, err))?;

        Ok(Box::new(query.filter_map(move |result| {
            result
                .and_then(|record| interval_from_record(&record))
                .map_err(|err| read_error(&name, err))
                .transpose()
        })))
    }
}

///
/// Convert a BAM record into an alignment interval, or `None` for records that are
/// unmapped or carry no alignment start.
///
pub fn interval_from_record(record: &bam::Record) -> io::Result<Option<AlignmentInterval>> {
    let flags = record.flags();
    if flags.is_unmapped() {
        return Ok(None);
    }

    let Some(start) = record.alignment_start().transpose()? else {
        return Ok(None);
    };
    let start = usize::from(start) as i64 - 1;

    let ops = record
        .cigar()
        .iter()
        .map(|op| op.map(|op| (op.kind(), op.len())))
        .collect::<io::Result<Vec<_>>>()?;

    Ok(Some(interval_from_cigar(start, &ops, !flags.is_secondary())))
}

///
/// Build an alignment interval from a 0-based start and CIGAR operations.
///
/// The end is the start plus every reference-consuming operation. Only the first and
/// last operations are checked for soft clips; a soft clip behind a hard clip is not
/// counted.
///
pub fn interval_from_cigar(start: i64, ops: &[(Kind, usize)], is_primary: bool) -> AlignmentInterval {
    let span: usize = ops
        .iter()
        .filter(|(kind, _)| consumes_reference(*kind))
        .map(|(_, len)| *len)
        .sum();

    let soft_clip = |op: Option<&(Kind, usize)>| match op {
        Some((Kind::SoftClip, len)) => *len as u32,
        _ => 0,
    };

    // a lone soft clip op is both the first and the last op
    AlignmentInterval {
        start,
        end: start + span as i64,
        leading_clip: soft_clip(ops.first()),
        trailing_clip: soft_clip(ops.last()),
        is_primary,
    }
}

fn consumes_reference(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::Match | Kind::Deletion | Kind::Skip | Kind::SequenceMatch | Kind::SequenceMismatch
    )
}

///
/// Index a coordinate-sorted BAM by scanning every record once.
///
fn build_index(path: &Path) -> io::Result<bai::Index> {
    let mut reader = File::open(path).map(bam::io::Reader::new)?;
    let header = reader.read_header()?;

    let mut indexer = Indexer::<LinearIndex>::default();
    let mut record = bam::Record::default();
    let mut chunk_start = reader.get_ref().virtual_position();

    while reader.read_record(&mut record)? != 0 {
        let chunk_end = reader.get_ref().virtual_position();

        let context = match (
            record.reference_sequence_id().transpose()?,
            record.alignment_start().transpose()?,
            record.alignment_end().transpose()?,
        ) {
            // records without reference-consuming ops still occupy their start
            (Some(id), Some(start), Some(end)) => {
                Some((id, start, end.max(start), !record.flags().is_unmapped()))
            }
            _ => None,
        };

        indexer.add_record(context, Chunk::new(chunk_start, chunk_end))?;
        chunk_start = chunk_end;
    }

    Ok(indexer.build(header.reference_sequences().len()))
}

fn find_index(path: &Path) -> Option<PathBuf> {
    let mut appended = path.as_os_str().to_owned();
    appended.push(".");
    appended.push(BAI_FILE_EXTENSION);

    [PathBuf::from(appended), path.with_extension(BAI_FILE_EXTENSION)]
        .into_iter()
        .find(|candidate| candidate.is_file())
}

fn open_error(path: &Path, err: io::Error) -> SourceError {
    SourceError::Open {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

fn read_error(sequence: &str, err: io::Error) -> SourceError {
    SourceError::Read {
        sequence: sequence.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::num::NonZeroUsize;
    use tempfile::{TempDir, tempdir};

    use noodles::core::Position;
    use noodles::sam::alignment::RecordBuf;
    use noodles::sam::alignment::io::Write as _;
    use noodles::sam::alignment::record::Flags;
    use noodles::sam::alignment::record::cigar::Op;
    use noodles::sam::header::record::value::Map;
    use noodles::sam::header::record::value::map::ReferenceSequence as ReferenceSequenceMap;

    fn bam_header() -> sam::Header {
        sam::Header::builder()
            .add_reference_sequence(
                "chr1",
                Map::<ReferenceSequenceMap>::new(NonZeroUsize::new(20).unwrap()),
            )
            .add_reference_sequence(
                "chr2",
                Map::<ReferenceSequenceMap>::new(NonZeroUsize::new(10).unwrap()),
            )
            .build()
    }

    fn alignment(
        name: &str,
        flags: Flags,
        reference_sequence_id: usize,
        position: usize,
        ops: &[(Kind, usize)],
    ) -> RecordBuf {
        RecordBuf::builder()
            .set_name(name)
            .set_flags(flags)
            .set_reference_sequence_id(reference_sequence_id)
            .set_alignment_start(Position::try_from(position).unwrap())
            .set_cigar(ops.iter().map(|&(kind, len)| Op::new(kind, len)).collect())
            .build()
    }

    ///
    /// chr1: a soft-clipped primary at 3, a secondary at 4 and a placed unmapped read at 6.
    /// chr2: one primary at 1 with a trailing soft clip.
    ///
    fn write_bam(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("reads.bam");
        let header = bam_header();
        let records = [
            alignment("r1", Flags::empty(), 0, 3, &[(Kind::SoftClip, 2), (Kind::Match, 5)]),
            alignment("r2", Flags::SECONDARY, 0, 4, &[(Kind::Match, 4)]),
            alignment("r3", Flags::UNMAPPED, 0, 6, &[]),
            alignment("r4", Flags::empty(), 1, 1, &[(Kind::Match, 3), (Kind::SoftClip, 1)]),
        ];

        let mut writer = bam::io::Writer::new(File::create(&path).unwrap());
        writer.write_header(&header).unwrap();
        for record in &records {
            writer.write_alignment_record(&header, record).unwrap();
        }
        writer.try_finish().unwrap();

        path
    }

    fn chr1_intervals() -> Vec<AlignmentInterval> {
        vec![
            AlignmentInterval::primary(2, 7).with_clips(2, 0),
            AlignmentInterval::primary(3, 7).secondary(),
        ]
    }

    fn collect(source: &mut BamAlignmentSource, sequence: &ReferenceSequence) -> Vec<AlignmentInterval> {
        source
            .alignments(sequence)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[rstest]
    fn test_plain_match() {
        let interval = interval_from_cigar(99, &[(Kind::Match, 50)], true);
        assert_eq!(interval, AlignmentInterval::primary(99, 149));
    }

    #[rstest]
    fn test_soft_clips_both_ends() {
        let ops = [
            (Kind::SoftClip, 5),
            (Kind::Match, 20),
            (Kind::Insertion, 2),
            (Kind::Match, 10),
            (Kind::SoftClip, 8),
        ];
        let interval = interval_from_cigar(10, &ops, true);

        assert_eq!(interval.start, 10);
        assert_eq!(interval.end, 40);
        assert_eq!(interval.leading_clip, 5);
        assert_eq!(interval.trailing_clip, 8);
    }

    #[rstest]
    fn test_reference_consuming_ops() {
        let ops = [
            (Kind::Match, 10),
            (Kind::Deletion, 3),
            (Kind::Skip, 100),
            (Kind::SequenceMatch, 4),
            (Kind::SequenceMismatch, 1),
            (Kind::Insertion, 7),
            (Kind::Pad, 2),
        ];
        let interval = interval_from_cigar(0, &ops, false);

        assert_eq!(interval.end, 118);
        assert!(!interval.is_primary);
    }

    #[rstest]
    fn test_hard_clip_hides_soft_clip() {
        let ops = [
            (Kind::HardClip, 4),
            (Kind::SoftClip, 6),
            (Kind::Match, 30),
            (Kind::HardClip, 2),
        ];
        let interval = interval_from_cigar(5, &ops, true);

        assert_eq!(interval.leading_clip, 0);
        assert_eq!(interval.trailing_clip, 0);
        assert_eq!(interval.end, 35);
    }

    #[rstest]
    fn test_missing_bam_is_an_open_error() {
        let result = BamSourceFactory::new("does/not/exist.bam");
        assert!(matches!(result, Err(SourceError::Open { .. })));
    }

    #[rstest]
    fn test_lone_soft_clip_counts_at_both_ends() {
        let interval = interval_from_cigar(4, &[(Kind::SoftClip, 3)], true);

        assert_eq!(interval.end, 4);
        assert_eq!(interval.leading_clip, 3);
        assert_eq!(interval.trailing_clip, 3);
    }

    #[rstest]
    fn test_interval_from_record() {
        let dir = tempdir().unwrap();
        let path = write_bam(&dir);

        let mut reader = bam::io::reader::Builder::default()
            .build_from_path(&path)
            .unwrap();
        reader.read_header().unwrap();

        let intervals: Vec<Option<AlignmentInterval>> = reader
            .records()
            .map(|record| interval_from_record(&record.unwrap()).unwrap())
            .collect();

        assert_eq!(
            intervals,
            vec![
                Some(AlignmentInterval::primary(2, 7).with_clips(2, 0)),
                Some(AlignmentInterval::primary(3, 7).secondary()),
                None,
                Some(AlignmentInterval::primary(0, 3).with_clips(0, 1)),
            ]
        );
    }

    #[rstest]
    fn test_reference_sequences_from_header() {
        let dir = tempdir().unwrap();
        let factory = BamSourceFactory::new(write_bam(&dir)).unwrap();

        assert_eq!(
            factory.reference_sequences().unwrap(),
            vec![
                ReferenceSequence::new("chr1", 20),
                ReferenceSequence::new("chr2", 10),
            ]
        );
    }

    #[rstest]
    #[case(None)]
    #[case(Some("reads.bam.bai"))]
    #[case(Some("reads.bai"))]
    fn test_source_queries_each_sequence(#[case] bai_file: Option<&str>) {
        let dir = tempdir().unwrap();
        let path = write_bam(&dir);

        if let Some(bai_file) = bai_file {
            let index = build_index(&path).unwrap();
            let mut writer = bai::io::Writer::new(File::create(dir.path().join(bai_file)).unwrap());
            writer.write_index(&index).unwrap();
        }
        assert_eq!(find_index(&path).is_some(), bai_file.is_some());

        let factory = BamSourceFactory::new(&path).unwrap();

        let mut source = factory.open().unwrap();
        let sequences = factory.reference_sequences().unwrap();

        assert_eq!(collect(&mut source, &sequences[0]), chr1_intervals());
        assert_eq!(
            collect(&mut source, &sequences[1]),
            vec![AlignmentInterval::primary(0, 3).with_clips(0, 1)]
        );
        // a second pass over the same reader
        assert_eq!(collect(&mut source, &sequences[0]), chr1_intervals());
    }

    #[rstest]
    fn test_unknown_sequence() {
        let dir = tempdir().unwrap();
        let factory = BamSourceFactory::new(write_bam(&dir)).unwrap();
        let mut source = factory.open().unwrap();

        assert!(matches!(
            source.alignments(&ReferenceSequence::new("chrUn", 5)),
            Err(SourceError::UnknownSequence(_))
        ));
    }
}

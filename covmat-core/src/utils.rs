use std::ffi::OsStr;
use std::fs::File;
use std::io::prelude::*;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use log::warn;

use crate::consts::{FEATURE_COMMENT, GZ_FILE_EXTENSION};
use crate::models::FeatureRecord;

///
/// Get a reader for either a gzip'd or non-gzip'd file.
///
/// # Arguments
///
/// - path: path to the file to read
///
pub fn get_dynamic_reader(path: &Path) -> Result<BufReader<Box<dyn Read>>> {
    let is_gzipped = path.extension() == Some(OsStr::new(GZ_FILE_EXTENSION));
    let file = File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;
    let file: Box<dyn Read> = match is_gzipped {
        true => Box::new(MultiGzDecoder::new(file)),
        false => Box::new(file),
    };

    let reader = BufReader::new(file);

    Ok(reader)
}

///
/// Read every well-formed feature from a GFF-style stream.
///
/// Blank lines and `#` comments are skipped silently; malformed lines are logged and
/// skipped. Only I/O failures are returned as errors.
///
/// # Arguments
///
/// - reader: buffered feature stream
///
pub fn read_features<R: BufRead>(reader: R) -> Result<Vec<FeatureRecord>> {
    let mut features = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read feature line {}", line_num + 1))?;

        if line.trim().is_empty() || line.starts_with(FEATURE_COMMENT) {
            continue;
        }

        match line.parse::<FeatureRecord>() {
            Ok(feature) => features.push(feature),
            Err(err) => warn!("Skipping feature line {}: {}", line_num + 1, err),
        }
    }

    Ok(features)
}

///
/// Read every well-formed feature from a (possibly gzipped) GFF-style file.
///
/// # Arguments
///
/// - path: path to the feature file
///
pub fn read_features_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<FeatureRecord>> {
    let path = path.as_ref();
    let reader = get_dynamic_reader(path)
        .with_context(|| format!("Failed to open feature file: {}", path.display()))?;

    read_features(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::io::Cursor;

    #[fixture]
    fn gff_text() -> &'static str {
        "##gff-version 3\n\
         chr1\tsrc\tgene\t1\t10\t.\t+\t.\tID=g1\n\
         \n\
         # a comment\n\
         chr1\tsrc\texon\t3\t7\t.\t+\t.\tID=e1;Parent=g1\n\
         chr1\tbroken\n\
         chr2\tsrc\tgene\t20\t5\t.\t-\t.\tID=g2\n\
         chr2\tsrc\tgene\t5\t20\t.\t-\t.\tID=g3\n"
    }

    #[rstest]
    fn test_read_features_skips_comments_and_malformed(gff_text: &str) {
        let features = read_features(Cursor::new(gff_text)).unwrap();

        let ids: Vec<&str> = features.iter().filter_map(|f| f.attribute("ID")).collect();
        assert_eq!(ids, vec!["g1", "e1", "g3"]);
    }

    #[rstest]
    fn test_read_features_from_gzipped_file(gff_text: &str) {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("features.gff.gz");

        let file = File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(gff_text.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let features = read_features_from_file(&path).unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[1].seqid, "chr1");
        assert_eq!(features[2].seqid, "chr2");
    }

    #[rstest]
    fn test_missing_feature_file_is_an_error() {
        let tempdir = tempfile::tempdir().unwrap();
        let result = read_features_from_file(tempdir.path().join("nope.gff"));
        assert!(result.is_err());
    }
}

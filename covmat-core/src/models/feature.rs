use std::fmt::{self, Display};
use std::str::FromStr;

use crate::consts::{ATTRIBUTE_ASSIGN, ATTRIBUTE_SEPARATOR, FEATURE_COLUMNS, FEATURE_DELIMITER};
use crate::errors::FeatureParseError;

///
/// One line of a GFF-style feature file.
///
/// Coordinates are 1-based and inclusive. Every column other than the coordinates is
/// kept verbatim so it can be echoed back in coverage reports.
///
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FeatureRecord {
    pub seqid: String,
    pub source: String,
    pub feature_type: String,
    pub start: u64,
    pub end: u64,
    pub score: String,
    pub strand: String,
    pub phase: String,
    pub attributes: String,
}

impl FeatureRecord {
    ///
    /// Number of bases in the feature (`end - start + 1`), saturating at `u64::MAX`.
    ///
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        (self.end - self.start).saturating_add(1)
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    ///
    /// Look up `key` in the `key=value;key=value` attribute column.
    ///
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .split(ATTRIBUTE_SEPARATOR)
            .filter_map(|item| item.split_once(ATTRIBUTE_ASSIGN))
            .find(|(k, _)| k.trim() == key)
            .map(|(_, v)| v)
    }
}

impl FromStr for FeatureRecord {
    type Err = FeatureParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = line.split(FEATURE_DELIMITER).collect();

        if fields.len() < FEATURE_COLUMNS {
            return Err(FeatureParseError::TooFewFields {
                expected: FEATURE_COLUMNS,
                found: fields.len(),
            });
        }

        let start = parse_coordinate("start", fields[3])?;
        let end = parse_coordinate("end", fields[4])?;

        if end < start {
            return Err(FeatureParseError::InvertedInterval { start, end });
        }

        Ok(FeatureRecord {
            seqid: fields[0].to_string(),
            source: fields[1].to_string(),
            feature_type: fields[2].to_string(),
            start,
            end,
            score: fields[5].to_string(),
            strand: fields[6].to_string(),
            phase: fields[7].to_string(),
            // anything past the ninth column belongs to the attributes
            attributes: fields[8..].join("\t"),
        })
    }
}

fn parse_coordinate(field: &'static str, value: &str) -> Result<u64, FeatureParseError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| FeatureParseError::InvalidCoordinate {
            field,
            value: value.to_string(),
        })
}

impl Display for FeatureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.seqid,
            self.source,
            self.feature_type,
            self.start,
            self.end,
            self.score,
            self.strand,
            self.phase,
            self.attributes
        )
    }
}

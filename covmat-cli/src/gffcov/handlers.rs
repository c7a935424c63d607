use std::io::{self, BufWriter};

use anyhow::{Context, Result};
use clap::ArgMatches;
use log::warn;

use covmat_aggregate::consts::DEFAULT_MIN_DEPTH;
use covmat_aggregate::{Sample, aggregate};
use covmat_core::utils::read_features_from_file;

pub fn run_gffcov(matches: &ArgMatches) -> Result<()> {
    let input = matches
        .get_one::<String>("input")
        .expect("A path to a feature file is required.");

    let stores: Vec<&String> = matches
        .get_many::<String>("stores")
        .expect("At least one coverage store is required.")
        .collect();

    let min_depth = resolve_min_depth(matches.get_one::<i64>("min-depth").copied())?;

    let features = read_features_from_file(input)
        .with_context(|| format!("Failed to read features from {input}"))?;

    let mut samples = stores
        .iter()
        .map(|path| {
            Sample::open(path).with_context(|| format!("Failed to open coverage store {path}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    aggregate(&mut samples, &features, min_depth, &mut out)?;

    Ok(())
}

///
/// A negative minimum depth falls back to the default with a warning.
///
fn resolve_min_depth(requested: Option<i64>) -> Result<u32> {
    match requested {
        None => Ok(DEFAULT_MIN_DEPTH),
        Some(depth) if depth < 0 => {
            warn!(
                "Minimum depth can't be negative ({}); using {}",
                depth, DEFAULT_MIN_DEPTH
            );
            Ok(DEFAULT_MIN_DEPTH)
        }
        Some(depth) => u32::try_from(depth)
            .with_context(|| format!("Minimum depth {depth} is too large")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    use crate::gffcov::cli::create_gffcov_cli;

    #[rstest]
    #[case(None, 5)]
    #[case(Some(0), 0)]
    #[case(Some(12), 12)]
    #[case(Some(-3), 5)]
    fn test_resolve_min_depth(#[case] requested: Option<i64>, #[case] expected: u32) {
        assert_eq!(resolve_min_depth(requested).unwrap(), expected);
    }

    #[rstest]
    fn test_min_depth_overflow() {
        assert!(resolve_min_depth(Some(i64::MAX)).is_err());
    }

    #[rstest]
    fn test_negative_min_depth_parses() {
        let matches = create_gffcov_cli()
            .try_get_matches_from(["gffcov", "-i", "genes.gff", "-m", "-1", "a.cvmx", "b.cvmx"])
            .unwrap();

        assert_eq!(matches.get_one::<i64>("min-depth"), Some(&-1));
        assert_eq!(matches.get_many::<String>("stores").unwrap().count(), 2);
    }
}

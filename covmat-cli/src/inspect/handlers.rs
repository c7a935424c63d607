use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use clap::ArgMatches;

use covmat_store::CoverageReader;

pub fn run_inspect(matches: &ArgMatches) -> Result<()> {
    let path = matches
        .get_one::<String>("store")
        .expect("A path to a coverage store is required.");

    let mut reader = CoverageReader::open_path(path)
        .with_context(|| format!("Failed to open coverage store {path}"))?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    write_listing(&mut reader, &mut out)?;

    reader.close();
    Ok(())
}

fn write_listing<W: Write>(reader: &mut CoverageReader, out: &mut W) -> Result<()> {
    let names: Vec<String> = reader
        .sequence_names()?
        .into_iter()
        .map(String::from)
        .collect();

    for name in names {
        let full_name = reader.full_name(&name)?;
        let length = reader.sequence_length(&name)?;
        let unique_reads = reader.total_unique_read_count(&name)?;
        writeln!(out, "{full_name}\t{length}\t{unique_reads}")?;
    }
    out.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use tempfile::tempdir;

    use covmat_core::models::CoverageRecord;
    use covmat_store::StoreWriter;

    #[rstest]
    fn test_listing_follows_store_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.cvmx");

        let mut writer = StoreWriter::new(&path);
        let mut chr2 = CoverageRecord::empty("chr2", 12);
        chr2.unique_read_count = 4;
        writer.write_record(&chr2).unwrap();
        writer.write_record(&CoverageRecord::empty("chr1", 3)).unwrap();
        writer.finish().unwrap();

        let mut reader = CoverageReader::open_path(&path).unwrap();
        let mut out = Vec::new();
        write_listing(&mut reader, &mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "chr2\t12\t4\nchr1\t3\t0\n");
    }
}

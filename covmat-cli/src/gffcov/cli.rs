use clap::{Arg, Command, arg, value_parser};

pub const GFFCOV_CMD: &str = "gffcov";

pub fn create_gffcov_cli() -> Command {
    Command::new(GFFCOV_CMD)
        .author("Databio")
        .about("Report average depth and covered bases of every feature in one or more coverage stores.")
        .arg(arg!(-i --input <FEATURES> "GFF-style feature file, optionally gzipped").required(true))
        .arg(
            Arg::new("min-depth")
                .short('m')
                .long("min-depth")
                .value_parser(value_parser!(i64))
                .allow_negative_numbers(true)
                .help("Depth at or above which a base counts as covered (default: 5)"),
        )
        .arg(
            Arg::new("stores")
                .required(true)
                .num_args(1..)
                .help("One or more coverage stores; each becomes a sample column"),
        )
}

use clap::{Command, arg, value_parser};

pub const BUILD_CMD: &str = "build";

pub fn create_build_cli() -> Command {
    Command::new(BUILD_CMD)
        .author("Databio")
        .about("Build a coverage store (per-base depth and clip-end counts) from a BAM file.")
        .arg(arg!(-i --input <BAM> "Input BAM file").required(true))
        .arg(arg!(-o --output <STORE> "Coverage store to create").required(true))
        .arg(
            arg!(-t --threads <WORKERS> "Number of sequences processed in parallel (default: 8)")
                .value_parser(value_parser!(usize)),
        )
}

use clap::{Arg, Command};

pub const INSPECT_CMD: &str = "inspect";

pub fn create_inspect_cli() -> Command {
    Command::new(INSPECT_CMD)
        .author("Databio")
        .about("List the sequences in a coverage store with their length and unique read count.")
        .arg(Arg::new("store").required(true).help("Coverage store to inspect"))
}

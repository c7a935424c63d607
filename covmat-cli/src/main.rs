mod build;
mod gffcov;
mod inspect;

use anyhow::Result;
use clap::Command;
use env_logger::Env;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const BIN_NAME: &str = "covmat";
}

fn build_parser() -> Command {
    Command::new(consts::BIN_NAME)
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .author("Databio")
        .about("Per-base depth and clip-end matrices from BAM files, and per-feature coverage reports across samples.")
        .subcommand_required(true)
        .subcommand(build::cli::create_build_cli())
        .subcommand(gffcov::cli::create_gffcov_cli())
        .subcommand(inspect::cli::create_inspect_cli())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let app = build_parser();
    let matches = app.get_matches();

    match matches.subcommand() {
        //
        // BUILD
        //
        Some((build::cli::BUILD_CMD, matches)) => {
            build::handlers::run_build(matches)?;
        }

        //
        // GFF COVERAGE
        //
        Some((gffcov::cli::GFFCOV_CMD, matches)) => {
            gffcov::handlers::run_gffcov(matches)?;
        }

        //
        // INSPECT
        //
        Some((inspect::cli::INSPECT_CMD, matches)) => {
            inspect::handlers::run_inspect(matches)?;
        }

        _ => unreachable!("Subcommand not found"),
    };

    Ok(())
}

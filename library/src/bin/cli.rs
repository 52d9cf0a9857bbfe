use clap::Parser;
use texgen::LibraryError;
use texgen::cli::{Cli, run};

fn main() -> Result<(), LibraryError> {
    env_logger::init();
    run(Cli::parse())
}

//! `psk-sim` CLI application
//!
//! The CLI application is organized in two subcommands, `ber` and `ser`,
//! which run a Monte Carlo BER or SER sweep respectively. See the modules
//! below for examples and more information about how to use each
//! subcommand.

use clap::Parser;
use std::error::Error;

pub mod ber;
pub mod ser;
pub mod sweep;

/// Trait to run a CLI subcommand
pub trait Run {
    /// Run the CLI subcommand
    fn run(&self) -> Result<(), Box<dyn Error>>;
}

/// CLI arguments.
#[derive(Debug, Parser)]
#[command(author, version, name = "psk-sim", about = "M-PSK error-rate simulator")]
pub enum Args {
    /// ber subcommand
    Ber(ber::Args),
    /// ser subcommand
    Ser(ser::Args),
}

impl Run for Args {
    fn run(&self) -> Result<(), Box<dyn Error>> {
        match self {
            Args::Ber(x) => x.run(),
            Args::Ser(x) => x.run(),
        }
    }
}

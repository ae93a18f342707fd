//! SER sweep CLI subcommand.
//!
//! This subcommand runs a Monte Carlo symbol-error-rate sweep for a
//! Gray-coded M-PSK modulation over an AWGN channel. The sweep axis is
//! Eb/N0 in dB, as for the `ber` subcommand; the conversion to Es/N0 for
//! the channel is done internally.
//!
//! # Examples
//!
//! The SER of 8PSK between 2 and 12 dB Eb/N0 can be simulated with
//! ```shell
//! $ psk-sim ser --order 8 --min-ebn0 2.0 --max-ebn0 12.0 --step-ebn0 1.0
//! ```

use super::{sweep::SweepArgs, Run};
use crate::simulation::sweep::ErrorUnit;
use clap::Parser;
use std::error::Error;

/// SER sweep CLI arguments.
#[derive(Debug, Parser)]
#[command(about = "Performs a Monte Carlo SER sweep")]
pub struct Args {
    /// Sweep parameters.
    #[command(flatten)]
    sweep: SweepArgs,
}

impl Run for Args {
    fn run(&self) -> Result<(), Box<dyn Error>> {
        self.sweep.run(ErrorUnit::Symbol)
    }
}

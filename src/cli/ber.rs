//! BER sweep CLI subcommand.
//!
//! This subcommand runs a Monte Carlo bit-error-rate sweep for a Gray-coded
//! M-PSK modulation over an AWGN channel.
//!
//! # Examples
//!
//! The BER of QPSK between 0 and 8 dB Eb/N0 can be simulated with
//! ```shell
//! $ psk-sim ber --order 4 --min-ebn0 0.0 --max-ebn0 8.0 --step-ebn0 0.5
//! ```

use super::{sweep::SweepArgs, Run};
use crate::simulation::sweep::ErrorUnit;
use clap::Parser;
use std::error::Error;

/// BER sweep CLI arguments.
#[derive(Debug, Parser)]
#[command(about = "Performs a Monte Carlo BER sweep")]
pub struct Args {
    /// Sweep parameters.
    #[command(flatten)]
    sweep: SweepArgs,
}

impl Run for Args {
    fn run(&self) -> Result<(), Box<dyn Error>> {
        self.sweep.run(ErrorUnit::Bit)
    }
}

//! # psk-sim
//!
//! `psk_sim` estimates bit and symbol error rates of M-ary PSK modulation
//! over an AWGN channel by Monte Carlo simulation, and evaluates the
//! closed-form theoretical error-rate curves for comparison.
//!
//! It can be used as a Rust library or as a CLI tool that runs BER and SER
//! sweeps from the command line. See [`cli`] for documentation about the
//! usage of the CLI tool.

#![warn(missing_docs)]

pub mod cli;
pub mod rand;
pub mod simulation;

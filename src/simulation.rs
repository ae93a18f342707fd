//! Simulation.
//!
//! This module contains utilities to simulate the BER and SER of M-PSK
//! modulation in an AWGN channel.

pub mod channel;
pub mod modulation;
pub mod sweep;
pub mod theory;

//! Modulation and demodulation.
//!
//! This module implements Gray-coded M-PSK modulation of symbol labels to
//! complex baseband symbols, and the matching minimum-distance demodulation
//! of received symbols back to labels.
//!
//! The constellation point at position `p` (for `p` in `0..order`) is
//! `exp(i * (2 pi p / order + phase_offset))`, and the information label
//! assigned to position `p` is its binary-reflected Gray code `p ^ (p >> 1)`.
//! Adjacent decision regions therefore differ in exactly one bit, which is
//! what makes the Gray BER approximation `Pb ~ Ps / log2(M)` hold. Labels
//! are `log2(order)`-bit values, MSB first.

use num_complex::Complex;
use std::f64::consts::TAU;
use thiserror::Error;

/// Largest supported modulation order.
pub const MAX_ORDER: u32 = 256;

/// Modulation error.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Error)]
pub enum Error {
    /// The modulation order is not a power of two in `2..=256`.
    #[error("order = {0} is not a power of two in 2..=256")]
    UnsupportedOrder(u32),
    /// A symbol label is outside the modulation alphabet.
    #[error("label = {label} is outside the alphabet of order {order}")]
    LabelOutOfRange {
        /// The offending label.
        label: u8,
        /// The modulation order.
        order: u32,
    },
}

/// M-PSK modulator.
///
/// Maps Gray-coded symbol labels to unit-power constellation points.
#[derive(Debug, Clone)]
pub struct PskModulator {
    order: u32,
    bits_per_symbol: u32,
    constellation: Vec<Complex<f64>>,
}

/// M-PSK demodulator.
///
/// Assumes the same Gray labeling and phase offset as the [`PskModulator`].
/// Performs minimum-distance decisions, which for PSK reduce to rounding the
/// received phase angle to the nearest multiple of `2 pi / order`.
#[derive(Debug, Clone)]
pub struct PskDemodulator {
    order: u32,
    phase_offset: f64,
}

fn check_order(order: u32) -> Result<(), Error> {
    if (2..=MAX_ORDER).contains(&order) && order.is_power_of_two() {
        Ok(())
    } else {
        Err(Error::UnsupportedOrder(order))
    }
}

/// Returns the binary-reflected Gray code of a constellation position.
fn gray(position: u32) -> u32 {
    position ^ (position >> 1)
}

impl PskModulator {
    /// Creates a new M-PSK modulator with zero phase offset.
    ///
    /// The `order` must be a power of two in `2..=256`.
    pub fn new(order: u32) -> Result<PskModulator, Error> {
        Self::with_phase_offset(order, 0.0)
    }

    /// Creates a new M-PSK modulator with a carrier phase offset in radians.
    pub fn with_phase_offset(order: u32, phase_offset: f64) -> Result<PskModulator, Error> {
        check_order(order)?;
        // Indexed by label: constellation[gray(p)] is the point at
        // position p.
        let mut constellation = vec![Complex::new(0.0, 0.0); order as usize];
        for p in 0..order {
            let phase = TAU * f64::from(p) / f64::from(order) + phase_offset;
            constellation[gray(p) as usize] = Complex::new(phase.cos(), phase.sin());
        }
        Ok(PskModulator {
            order,
            bits_per_symbol: order.ilog2(),
            constellation,
        })
    }

    /// Returns the modulation order.
    pub fn order(&self) -> u32 {
        self.order
    }

    /// Returns the number of bits per symbol.
    pub fn bits_per_symbol(&self) -> u32 {
        self.bits_per_symbol
    }

    /// Modulates a sequence of symbol labels into constellation points.
    ///
    /// An error is returned if any label is outside `0..order`.
    pub fn modulate(&self, labels: &[u8]) -> Result<Vec<Complex<f64>>, Error> {
        labels
            .iter()
            .map(|&label| {
                self.constellation
                    .get(usize::from(label))
                    .copied()
                    .ok_or(Error::LabelOutOfRange {
                        label,
                        order: self.order,
                    })
            })
            .collect()
    }
}

impl PskDemodulator {
    /// Creates a new M-PSK demodulator with zero phase offset.
    pub fn new(order: u32) -> Result<PskDemodulator, Error> {
        Self::with_phase_offset(order, 0.0)
    }

    /// Creates a new M-PSK demodulator with a carrier phase offset in
    /// radians.
    pub fn with_phase_offset(order: u32, phase_offset: f64) -> Result<PskDemodulator, Error> {
        check_order(order)?;
        Ok(PskDemodulator {
            order,
            phase_offset,
        })
    }

    /// Demodulates a sequence of received symbols into decided labels.
    pub fn demodulate(&self, symbols: &[Complex<f64>]) -> Vec<u8> {
        symbols.iter().map(|&x| self.demodulate_symbol(x)).collect()
    }

    fn demodulate_symbol(&self, symbol: Complex<f64>) -> u8 {
        let order = f64::from(self.order);
        let phase = (symbol.arg() - self.phase_offset) / TAU;
        // rem_euclid folds the rounded position into 0..order (a phase just
        // below 2 pi rounds to order).
        let position = (phase * order).round().rem_euclid(order) as u32;
        gray(position) as u8
    }
}

/// Counts the differing bits between two sequences of symbol labels.
///
/// Used for BER accounting: with Gray labeling, a decision error to an
/// adjacent constellation point costs exactly one bit.
pub fn count_bit_errors(a: &[u8], b: &[u8]) -> u64 {
    a.iter()
        .zip(b.iter())
        .map(|(&a, &b)| u64::from((a ^ b).count_ones()))
        .sum()
}

/// Counts the differing symbols between two sequences of symbol labels.
pub fn count_symbol_errors(a: &[u8], b: &[u8]) -> u64 {
    a.iter().zip(b.iter()).filter(|(&a, &b)| a != b).count() as u64
}

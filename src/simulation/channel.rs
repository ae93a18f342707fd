//! Channel simulation.
//!
//! This module contains the simulation of a complex AWGN channel whose noise
//! power is calibrated against the empirical power of the transmitted
//! symbols, so that a requested Es/N0 in dB holds regardless of the
//! constellation scaling or block length.

use num_complex::Complex;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use thiserror::Error;

/// Es/N0 magnitude in dB beyond which the linear ratio saturates in f64.
///
/// Values beyond this are accepted and handled best-effort (the noise
/// standard deviation saturates towards zero or infinity), but callers may
/// want to warn about them. See [`is_extreme_snr`].
pub const EXTREME_SNR_DB: f64 = 300.0;

/// Channel error.
#[derive(Debug, Copy, Clone, PartialEq, Error)]
pub enum Error {
    /// The symbol sequence is empty, so its average power is undefined.
    #[error("symbols is empty: average power is undefined")]
    EmptySymbols,
    /// The requested Es/N0 is NaN or infinite.
    #[error("esn0_db = {0} is not finite")]
    NonFiniteSnr(f64),
    /// The symbol sequence has zero average power.
    #[error("symbols has zero average power: noise power is undefined")]
    ZeroSignalPower,
}

/// Returns `true` if `esn0_db` falls outside the range where the linear
/// Es/N0 ratio is representable without saturation.
pub fn is_extreme_snr(esn0_db: f64) -> bool {
    esn0_db.abs() > EXTREME_SNR_DB
}

/// Adds AWGN to a sequence of symbols at a requested Es/N0.
///
/// The noise power spectral density is derived from the empirical average
/// power of `symbols`: `N0 = mean(|x|^2) / 10^(esn0_db / 10)`. Each symbol
/// gets independent Gaussian perturbations of variance `N0 / 2` on the real
/// and imaginary axes, so the expected total noise power per symbol is `N0`.
/// An [Rng] is used as source of randomness.
///
/// The input slice is not modified; a new vector with the same length and
/// order is returned. An error is returned if `symbols` is empty or has zero
/// average power, or if `esn0_db` is not finite.
pub fn add_noise<R: Rng>(
    rng: &mut R,
    symbols: &[Complex<f64>],
    esn0_db: f64,
) -> Result<Vec<Complex<f64>>, Error> {
    if symbols.is_empty() {
        return Err(Error::EmptySymbols);
    }
    if !esn0_db.is_finite() {
        return Err(Error::NonFiniteSnr(esn0_db));
    }
    let signal_power = symbols.iter().map(|x| x.norm_sqr()).sum::<f64>() / symbols.len() as f64;
    if signal_power == 0.0 {
        return Err(Error::ZeroSignalPower);
    }
    let esn0 = 10.0_f64.powf(0.1 * esn0_db);
    let noise_density = signal_power / esn0;
    let sigma = (0.5 * noise_density).sqrt();
    // For an Es/N0 below roughly -3000 dB the linear ratio underflows to
    // zero and sigma overflows to infinity. Saturate to f64::MAX so that the
    // computation proceeds best-effort instead of failing.
    let sigma = if sigma.is_finite() { sigma } else { f64::MAX };
    // Normal::new only fails for a negative or NaN standard deviation, which
    // cannot happen after the checks above.
    let distr = Normal::new(0.0, sigma).unwrap();
    Ok(symbols
        .iter()
        .map(|&x| x + Complex::new(distr.sample(rng), distr.sample(rng)))
        .collect())
}

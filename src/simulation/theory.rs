//! Theoretical error rates.
//!
//! This module evaluates the closed-form error-rate curves of Gray-coded
//! M-PSK over AWGN, used as a reference overlay for the simulated curves.
//! It is never used inside the estimation loop itself.
//!
//! BPSK and QPSK use the exact expressions; for M >= 8 the usual
//! nearest-neighbour approximation `Ps ~ erfc(sqrt(Es/N0) sin(pi/M))` is
//! used, with `Pb ~ Ps / log2(M)` under Gray labeling.

use super::modulation::{self, MAX_ORDER};

fn check_order(order: u32) -> Result<(), modulation::Error> {
    if (2..=MAX_ORDER).contains(&order) && order.is_power_of_two() {
        Ok(())
    } else {
        Err(modulation::Error::UnsupportedOrder(order))
    }
}

fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(0.1 * db)
}

/// Theoretical bit error rate of Gray-coded M-PSK at an Eb/N0 in dB.
///
/// An error is returned if `order` is not a power of two in `2..=256`.
pub fn bit_error_rate(order: u32, ebn0_db: f64) -> Result<f64, modulation::Error> {
    check_order(order)?;
    let ebn0 = db_to_linear(ebn0_db);
    Ok(match order {
        // QPSK has the same BER as BPSK at equal Eb/N0.
        2 | 4 => 0.5 * erfc(ebn0.sqrt()),
        m => {
            let k = f64::from(m.ilog2());
            symbol_error_rate_linear(m, k * ebn0) / k
        }
    })
}

/// Theoretical symbol error rate of M-PSK at an Eb/N0 in dB.
///
/// An error is returned if `order` is not a power of two in `2..=256`.
pub fn symbol_error_rate(order: u32, ebn0_db: f64) -> Result<f64, modulation::Error> {
    check_order(order)?;
    let ebn0 = db_to_linear(ebn0_db);
    let esn0 = f64::from(order.ilog2()) * ebn0;
    Ok(symbol_error_rate_linear(order, esn0))
}

fn symbol_error_rate_linear(order: u32, esn0: f64) -> f64 {
    match order {
        2 => 0.5 * erfc(esn0.sqrt()),
        4 => {
            let x = erfc((0.5 * esn0).sqrt());
            x * (1.0 - 0.25 * x)
        }
        m => erfc(esn0.sqrt() * (std::f64::consts::PI / f64::from(m)).sin()),
    }
}

/// Complementary error function.
///
/// Abramowitz & Stegun approximation 7.1.26 (absolute error below 1.5e-7).
fn erfc(x: f64) -> f64 {
    let t = 1.0 / (1.0 + 0.3275911 * x.abs());
    let poly = t
        * (0.254829592
            + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    let result = poly * (-x * x).exp();
    if x >= 0.0 {
        result
    } else {
        2.0 - result
    }
}

//! # Reproducible random functions
//!
//! This module uses the [`ChaCha8Rng`] RNG from the [rand_chacha] crate
//! to achieve reproducible random number generation. Simulations seeded
//! with the same value produce the same error-rate curves.
//!
//! # Examples
//! ```
//! # use psk_sim::rand::Rng;
//! # use psk_sim::rand::*;
//! let seed = 42;
//! let mut rng = Rng::seed_from_u64(seed);
//! assert_eq!(rng.next_u64(), 12578764544318200737);
//! ```
use rand_chacha::ChaCha8Rng;
pub use rand_chacha::rand_core::SeedableRng;
pub use rand_core::RngCore;

/// The RNG used throughout this crate for algorithms using pseudorandom
/// generation.
pub type Rng = ChaCha8Rng;

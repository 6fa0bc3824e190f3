//! # Utreexo
//!
//! A Rust implementation of [Utreexo](https://eprint.iacr.org/2019/611.pdf), a hash based
//! accumulator for the UTXO set that only needs a logarithmic amount of space. Elements are
//! added when outputs are created and deleted when they are spent. Whoever keeps the whole
//! set, the bridge, hands out inclusion proofs for the spent elements, and everybody else
//! checks them against the few roots they hold.
//!
//! The [accumulator] module has the accumulators and proofs. [simchain] generates fake
//! blocks to drive them in tests and benchmarks, and [bridge] serves blocks along with their
//! proofs over TCP.
//!
//! For more information, check each module's documentation.

pub mod accumulator;
#[cfg(feature = "bridge")]
pub mod bridge;
pub mod simchain;

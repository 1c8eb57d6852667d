//! Word-size RNS polynomial arithmetic over Z_q[X]/(X^N + 1).
//!
//! This crate provides the arithmetic substrate used by the `ckks` crate:
//! NTT-friendly primes, the negacyclic NTT, polynomials in RNS representation,
//! Galois automorphisms, exact rounded division by the last modulus and CRT
//! reconstruction.

pub mod automorphism;
pub mod dft;
pub mod modulus;
pub mod poly;
pub mod ring;
pub mod serialization;

//! # Klib: Utilitários Internos
//!
//! Estruturas e helpers sem dependência de hardware.

pub mod fifo;
pub mod test_framework;

pub use fifo::Fifo;

/// Divisão com arredondamento para cima.
#[inline]
pub const fn div_ceil(a: u32, b: u32) -> u32 {
    (a + b - 1) / b
}

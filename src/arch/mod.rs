//! # Arch: Camada de Abstração de Hardware
//!
//! Todo o assembly inline do kernel vive aqui, exposto como funções puras.
//! O restante do kernel nunca emite instruções diretamente.

pub mod x86;

// Plataforma ativa (única suportada: x86 32-bit)
pub use x86 as platform;
pub use x86::cpu;
pub use x86::cpu::Cpu;

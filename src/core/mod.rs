//! # Core: Núcleo do Kernel
//!
//! Infraestrutura central: boot, logging, pânico, registros per-CPU e
//! tempo.
//!
//! | Módulo    | Responsabilidade                             |
//! |-----------|----------------------------------------------|
//! | `entry`   | kernel_entry (BSP) e ordem de inicialização  |
//! | `handoff` | Mapa de memória do bootloader (Multiboot v1) |
//! | `logging` | Macros kerror!/kwarn!/kinfo!/kdebug!/ktrace! |
//! | `panic`   | Crash reporter + halt de todos os núcleos    |
//! | `smp`     | Per-CPU e bringup de APs                     |
//! | `time`    | Jiffies e listas de eventos de timer         |

pub mod entry;
pub mod handoff;
pub mod logging;
pub mod panic;
pub mod smp;
pub mod time;

pub use handoff::BootInfo;

//! # Kernel Driver Layer
//!
//! Camada que implementa a lógica específica de dispositivos, traduzindo
//! comandos de alto nível do kernel para I/O ports e MMIO.
//!
//! | Driver    | Responsabilidade |
//! |-----------|------------------|
//! | `serial`  | Porta Serial (COM1/UART 16550). Saída primária de logs. |
//! | `console` | Console de texto VGA 80×25. Diagnósticos visíveis. |
//! | `timer`   | Programmable Interval Timer (PIT 8254). Heartbeat de 100Hz. |
//! | `ps2`     | Teclado PS/2 como task de driver + serviço "keyboard". |

pub mod console;
pub mod ps2;
pub mod serial;
pub mod timer;

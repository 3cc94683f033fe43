//! Panic Handler (Kernel Crash Reporter).
//!
//! O último recurso do sistema. Quando invocado, assume-se que o estado
//! do kernel é inconsistente e irrecuperável.
//!
//! # Protocolo de Pânico
//! 1. Desabilitar Interrupções (imediato).
//! 2. Parar os outros núcleos (IPI de halt, se houver PIC instalado).
//! 3. Logar causa e localização (serial + console).
//! 4. Halt Loop (congelar a CPU).

use core::fmt::Write;
use core::panic::PanicInfo;

use crate::arch::Cpu;
use crate::drivers::{console, serial};

/// Handler chamado pelo compilador Rust em `panic!`.
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    // 1. Silêncio: nenhum scheduler ou driver pode rodar em estado
    // corrompido.
    Cpu::disable_interrupts();

    // 2. Os outros núcleos congelam no vetor de halt.
    crate::interrupt::stop_all_other_processors();

    // 3. Relatório.
    crate::kerror!("=====   PANICO DO KERNEL (CRITICO)   =====");

    let mut port = serial::SerialPort::new(0x3F8);
    if let Some(location) = info.location() {
        let _ = write!(
            port,
            "Localizacao: {}:{}:{}\r\n",
            location.file(),
            location.line(),
            location.column()
        );
    }
    let _ = write!(port, "Razao: {}\r\n", info.message());

    unsafe {
        console::force_write(|c| {
            c.set_attr(console::PANIC_ATTR);
            c.write_str("\nPANICO DO KERNEL");
            if let Some(location) = info.location() {
                c.write_str(" em ");
                c.write_str(location.file());
                c.write_str(":");
                c.write_hex32(location.line());
            }
            c.write_str("\nSistema congelado. Reset manual necessario.\n");
        });
    }

    crate::kerror!("Sistema congelado. Reset manual necessario.");

    // 4. Congelar.
    Cpu::hang();
}

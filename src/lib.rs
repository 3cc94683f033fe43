//! Brasa Kernel Library.
//!
//! Ponto central de exportação dos módulos do Kernel.
//! Define a estrutura hierárquica do sistema operacional.

#![no_std]
#![feature(naked_functions)]
#![feature(alloc_error_handler)]

// Habilitar alocação dinâmica (necessário para Vec/Box/Arc)
extern crate alloc;

// --- Módulos de Baixo Nível (Hardware) ---
pub mod arch; // HAL (CPU, Ports, GDT, IDT, V8086)
pub mod drivers; // Drivers Específicos (Serial, Console, PIT, PS/2)

// --- Módulos Centrais (Lógica do Kernel) ---
pub mod core; // Inicialização, Panic, Logging, Per-CPU, Tempo
pub mod interrupt; // Tabela de Vetores e Controladores (8259/APIC)
pub mod klib; // Utilitários Internos (FIFO, Test Framework)
pub mod mm; // Gerenciamento de Memória (Buddy, Slab, Heap, Paging)
pub mod sync; // Primitivas de Sincronização (Spinlock, Semáforo)

// --- Subsistemas Avançados ---
pub mod sched; // Scheduler e Tarefas
pub mod syscall; // Interface com Userspace

// Re-exportar BootInfo para acesso fácil no binário
pub use crate::core::handoff::BootInfo;

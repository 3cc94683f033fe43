//! Kernel Brasa: Binário Principal.
//!
//! Responsabilidade:
//! 1. Declarar o cabeçalho Multiboot v1.
//! 2. Configurar o ambiente de execução "naked" (Assembly) e a Stack do BSP.
//! 3. Saltar para `core::entry::kernel_entry` com os registradores do Multiboot.

#![no_std]
#![no_main]
#![feature(naked_functions)]
#![feature(alloc_error_handler)]

use brasa::core::entry;

// Stack de boot do BSP (16 KB).
// Alinhamento de 16 bytes é mandatório para a ABI cdecl que usamos.
#[repr(align(16))]
struct BootStack([u8; 16 * 1024]);

#[no_mangle]
static BOOT_STACK: BootStack = BootStack([0; 16 * 1024]);

// Cabeçalho Multiboot v1: precisa estar nos primeiros 8 KiB do binário.
// flags bit 1 = pedimos o mapa de memória (mem_* + mmap_*).
core::arch::global_asm!(
    r#"
.section .multiboot, "a"
.align 4
.long 0x1BADB002
.long 0x00000002
.long -(0x1BADB002 + 0x00000002)
.section .text
"#
);

/// Ponto de entrada Naked.
///
/// O GRUB (ou qualquer loader Multiboot v1) entrega:
/// - EAX = magic (0x2BADB002)
/// - EBX = endereço físico da estrutura multiboot_info
///
/// Configura o Stack Pointer (ESP) e chama o código Rust.
#[naked]
#[no_mangle]
pub unsafe extern "C" fn _start() -> ! {
    core::arch::naked_asm!(
        // 1. Configurar Stack Pointer (ESP)
        "lea esp, [{stack} + {stack_size}]",

        // 2. Zerar EBP (Frame Pointer) para terminar stack traces corretamente
        "xor ebp, ebp",

        // 3. Empilhar argumentos (cdecl: direita para esquerda)
        "push ebx",
        "push eax",
        "call {kernel_entry}",

        // 4. Trap (caso kernel_entry retorne, o que é impossível)
        "cli",
        "hlt",
        "jmp . - 2",

        stack = sym BOOT_STACK,
        stack_size = const 16 * 1024,
        kernel_entry = sym entry::kernel_entry,
    );
}

/// Handler de erro de alocação (OOM).
/// Requerido porque usamos `extern crate alloc`.
#[alloc_error_handler]
fn alloc_error_handler(layout: core::alloc::Layout) -> ! {
    panic!("Kernel OOM: {:?}", layout)
}

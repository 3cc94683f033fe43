//! Driver do Local APIC (LAPIC).
//!
//! Cada núcleo possui seu próprio LAPIC, todos visíveis no mesmo endereço
//! MMIO. Funções principais:
//! - Receber interrupções do I/O APIC.
//! - Timer local por núcleo (tick do scheduler nos APs).
//! - Gerar IPIs (INIT/SIPI no bringup, broadcast no pânico).
//! - Sinalizar End of Interrupt (EOI).

use core::sync::atomic::{AtomicU32, Ordering};

use crate::arch::cpu::IA32_APIC_BASE;
use crate::arch::Cpu;

/// Endereço físico padrão (sobrescrito pela MADT).
const DEFAULT_BASE: u32 = 0xFEE0_0000;

// Offsets MMIO
const REG_ID: usize = 0x020;
const REG_TPR: usize = 0x080; // Task Priority
const REG_EOI: usize = 0x0B0;
const REG_SVR: usize = 0x0F0; // Spurious Interrupt Vector
const REG_ESR: usize = 0x280; // Error Status Register
const REG_ICR_LOW: usize = 0x300; // Interrupt Command
const REG_ICR_HIGH: usize = 0x310;
const REG_LVT_TIMER: usize = 0x320;
const REG_TICR: usize = 0x380; // Timer Initial Count
const REG_TCCR: usize = 0x390; // Timer Current Count
const REG_TDCR: usize = 0x3E0; // Timer Divide Config

// Bits e Flags
const APIC_MSR_ENABLE: u64 = 1 << 11;
const SVR_SOFT_ENABLE: u32 = 1 << 8;
const LVT_MASKED: u32 = 1 << 16;
const LVT_TIMER_PERIODIC: u32 = 1 << 17;
const ICR_DELIVERY_PENDING: u32 = 1 << 12;
const ICR_INIT: u32 = 0x500;
const ICR_STARTUP: u32 = 0x600;
const ICR_ALL_EXCLUDING_SELF: u32 = 0b11 << 18;
const TIMER_DIVIDE_BY_16: u32 = 0b11;

static BASE: AtomicU32 = AtomicU32::new(DEFAULT_BASE);

#[inline]
unsafe fn read(offset: usize) -> u32 {
    let ptr = (BASE.load(Ordering::Relaxed) as usize + offset) as *const u32;
    core::ptr::read_volatile(ptr)
}

#[inline]
unsafe fn write(offset: usize, value: u32) {
    let ptr = (BASE.load(Ordering::Relaxed) as usize + offset) as *mut u32;
    core::ptr::write_volatile(ptr, value);
}

/// Registra o endereço MMIO vindo da MADT.
pub fn set_base(base: u32) {
    BASE.store(base, Ordering::Relaxed);
}

pub fn base() -> u32 {
    BASE.load(Ordering::Relaxed)
}

/// LAPIC ID do núcleo atual (bits 24-31 do registrador ID).
#[inline]
pub fn current_id() -> u32 {
    unsafe { read(REG_ID) >> 24 }
}

/// Inicializa o LAPIC do núcleo atual.
///
/// # Safety
/// O MMIO do LAPIC deve estar mapeado e o núcleo em Ring 0.
pub unsafe fn init_current(spurious_vector: u8) {
    // 1. Habilitar globalmente via MSR
    let msr = Cpu::read_msr(IA32_APIC_BASE);
    if msr & APIC_MSR_ENABLE == 0 {
        Cpu::write_msr(IA32_APIC_BASE, msr | APIC_MSR_ENABLE);
    }

    // 2. Aceitar todos os vetores acima das exceções
    write(REG_TPR, 1 << 4);

    // 3. Spurious vector + software enable
    write(REG_SVR, SVR_SOFT_ENABLE | spurious_vector as u32);

    // 4. Timer mascarado até a calibração
    write(REG_LVT_TIMER, LVT_MASKED);
    write(REG_TICR, 0);

    // 5. Limpar ESR (escrita dupla para hardware antigo) e estado pendente
    write(REG_ESR, 0);
    write(REG_ESR, 0);
    write(REG_EOI, 0);
}

/// Sinaliza End of Interrupt.
#[inline]
pub fn eoi() {
    unsafe { write(REG_EOI, 0) };
}

// =============================================================================
// TIMER LOCAL
// =============================================================================

/// Dispara o timer em modo one-shot com contagem máxima (calibração).
pub fn timer_start_calibration() {
    unsafe {
        write(REG_TDCR, TIMER_DIVIDE_BY_16);
        write(REG_LVT_TIMER, LVT_MASKED); // sem interrupção durante a medição
        write(REG_TICR, u32::MAX);
    }
}

/// Contagens consumidas desde `timer_start_calibration`.
pub fn timer_elapsed() -> u32 {
    unsafe { u32::MAX - read(REG_TCCR) }
}

/// Programa o timer periódico do núcleo atual.
pub fn timer_set_periodic(vector: u8, initial_count: u32) {
    unsafe {
        write(REG_TDCR, TIMER_DIVIDE_BY_16);
        write(REG_LVT_TIMER, LVT_TIMER_PERIODIC | vector as u32);
        write(REG_TICR, initial_count);
    }
}

// =============================================================================
// IPIs
// =============================================================================

unsafe fn wait_delivery() {
    while read(REG_ICR_LOW) & ICR_DELIVERY_PENDING != 0 {
        Cpu::pause();
    }
}

unsafe fn send_ipi(apic_id: u32, low: u32) {
    write(REG_ICR_HIGH, apic_id << 24);
    write(REG_ICR_LOW, low);
    wait_delivery();
}

/// INIT IPI para o núcleo alvo (primeiro passo do bringup).
pub unsafe fn interprocessor_init(apic_id: u32) {
    send_ipi(apic_id, ICR_INIT);
}

/// STARTUP IPI: o AP começa a executar em `vector << 12` (modo real).
pub unsafe fn interprocessor_startup(apic_id: u32, entry_page: u8) {
    send_ipi(apic_id, ICR_STARTUP | entry_page as u32);
}

/// IPI com vetor normal para todos os núcleos exceto o atual.
pub fn interrupt_all_excluding_self(vector: u8) {
    unsafe {
        write(REG_ICR_HIGH, 0);
        write(REG_ICR_LOW, ICR_ALL_EXCLUDING_SELF | vector as u32);
        wait_delivery();
    }
}

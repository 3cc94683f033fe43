//! Driver do 8259A PIC (Programmable Interrupt Controller legado).
//!
//! Remapeia as IRQs 0-15 para uma base de vetores contígua (normalmente
//! 32) e implementa a interface `Pic` para sistemas uniprocessador.
//!
//! A sequência de inicialização é exposta como função pura
//! (`reset_sequence`) para que o self-test verifique os bytes exatos de
//! ICW/OCW sem tocar no hardware.

use crate::arch::x86::ports::outb;
use crate::interrupt::{InterruptTable, InterruptVector, Pic};
use crate::sync::Spinlock;

// Portas (refer to chipset datasheet)
const M_CMD: u16 = 0x20; // ICW1 / OCW2 (EOI)
const M_DATA: u16 = 0x21; // ICW2-4 / OCW1 (máscara)
const S_CMD: u16 = 0xA0;
const S_DATA: u16 = 0xA1;

const ICW1_INIT: u8 = 0x11; // edge-triggered, cascade, ICW4 presente
const ICW4_8086: u8 = 0x01;
const EOI: u8 = 0x20; // non-specific EOI

/// Máscaras OCW1 em cache (espelho do registrador do hardware).
struct Masks {
    master: u8,
    slave: u8,
}

pub struct Pic8259 {
    vector_base: &'static InterruptVector,
    masks: Spinlock<Masks>,
}

/// Sequência completa de reset `(porta, byte)` para a base de vetores
/// dada: mascara tudo, ICW1-4 do master, ICW1-4 do slave, remascara.
pub fn reset_sequence(vector_base: u8) -> [(u16, u8); 12] {
    [
        (M_DATA, 0xFF),
        (S_DATA, 0xFF),
        (M_CMD, ICW1_INIT),
        (M_DATA, vector_base),
        (M_DATA, 1 << 2), // ICW3: slave na linha 2
        (M_DATA, ICW4_8086),
        (S_CMD, ICW1_INIT),
        (S_DATA, vector_base + 8),
        (S_DATA, 2), // ICW3: identidade de cascata
        (S_DATA, ICW4_8086),
        (M_DATA, 0xFF),
        (S_DATA, 0xFF),
    ]
}

/// Aplica a máscara de uma linha sobre o byte OCW1 atual.
/// Função pura (verificada pelo self-test).
pub fn apply_mask(current: u8, line: u32, masked: bool) -> u8 {
    let bit = 1u8 << (line & 7);
    if masked {
        current | bit
    } else {
        current & !bit
    }
}

impl Pic8259 {
    /// Registra 16 IRQs na tabela, reseta os dois chips para a base
    /// obtida e desmascara a linha de cascata (IRQ 2).
    pub fn init(table: &'static InterruptTable) -> Option<&'static Self> {
        let vector_base = table.register_irqs(0, 16)?;

        for (port, value) in reset_sequence(vector_base.number()) {
            unsafe { outb(port, value) };
        }

        let pic = crate::mm::new_one(Pic8259 {
            vector_base,
            masks: Spinlock::new(Masks {
                master: 0xFF,
                slave: 0xFF,
            }),
        })?;

        pic.set_mask(super::pic::SLAVE_IRQ, false);

        crate::kinfo!("(PIC) 8259 IRQ#0 mapeada no vetor ", vector_base.number());
        Some(pic)
    }

    /// Desliga os dois 8259 (sistemas que migram para APIC).
    pub fn disable_all() {
        for (port, value) in reset_sequence(0) {
            unsafe { outb(port, value) };
        }
    }
}

impl Pic for Pic8259 {
    fn set_mask(&self, irq: u32, masked: bool) {
        debug_assert!(irq < 16);
        let mut masks = self.masks.lock();
        if irq < 8 {
            masks.master = apply_mask(masks.master, irq, masked);
            unsafe { outb(M_DATA, masks.master) };
        } else {
            masks.slave = apply_mask(masks.slave, irq, masked);
            unsafe { outb(S_DATA, masks.slave) };
        }
    }

    fn irq_to_vector(&self, irq: u32) -> &'static InterruptVector {
        debug_assert!(irq < 16);
        crate::interrupt::system_table().vector_at(self.vector_base, irq)
    }

    fn end_of_interrupt(&self, vector: &InterruptVector) {
        let irq = vector.irq();
        debug_assert!((0..16).contains(&irq));
        unsafe {
            // Slave primeiro para IRQs >= 8, master sempre
            if irq >= 8 {
                outb(S_CMD, EOI);
            }
            outb(M_CMD, EOI);
        }
    }

    fn interrupt_all_other(&self, _vector: &InterruptVector) {
        // Uniprocessador: não há outros núcleos
    }

    fn number_of_processors(&self) -> u32 {
        1
    }
}

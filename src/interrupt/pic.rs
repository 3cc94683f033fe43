//! Abstração polimórfica de controlador de interrupções.
//!
//! Exatamente um `Pic` concreto existe por sistema: o 8259 legado (UP)
//! ou o par I/O APIC + Local APIC (SMP). Todos os call sites dependem
//! apenas desta interface.

use super::InterruptVector;

/// Linhas de IRQ legadas com nome.
pub const TIMER_IRQ: u32 = 0;
pub const KEYBOARD_IRQ: u32 = 1;
pub const SLAVE_IRQ: u32 = 2;
pub const MOUSE_IRQ: u32 = 12;

/// Capacidades comuns aos controladores.
pub trait Pic: Sync {
    /// Mascara (`true`) ou desmascara (`false`) uma linha de IRQ.
    fn set_mask(&self, irq: u32, masked: bool);

    /// Vetor associado à linha de IRQ (registrado no init do controlador).
    fn irq_to_vector(&self, irq: u32) -> &'static InterruptVector;

    /// Sinaliza fim de interrupção para o vetor dado.
    fn end_of_interrupt(&self, vector: &InterruptVector);

    /// Envia uma IPI com o vetor dado para todos os outros núcleos.
    /// No-op em controladores uniprocessador.
    fn interrupt_all_other(&self, vector: &InterruptVector);

    /// Número de processadores enumerados.
    fn number_of_processors(&self) -> u32;
}

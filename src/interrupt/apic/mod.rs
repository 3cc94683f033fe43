//! Controlador APIC (SMP): I/O APIC + um Local APIC por núcleo.
//!
//! Implementa a interface `Pic` e fornece as primitivas de bringup de
//! APs (INIT IPI + STARTUP IPI com a página de entrada).

pub mod ioapic;
pub mod lapic;

use crate::arch::x86::acpi::MadtInfo;
use crate::core::smp::percpu::MAX_CPUS;
use crate::interrupt::{InterruptTable, InterruptVector, Pic, SPURIOUS_VECTOR};
use crate::mm::vmm::{self, PageFlags};

use ioapic::IoApic;

pub struct Apic {
    ioapic: IoApic,
    vector_base: &'static InterruptVector,
    lapic_ids: [u8; MAX_CPUS],
    cpu_count: usize,
    /// GSI correspondente à IRQ `i` legada (apenas a 0 tem override).
    irq0_gsi: u32,
}

impl Apic {
    /// Monta o controlador a partir da MADT:
    /// mapeia os MMIOs, registra 16 IRQs na tabela de vetores, programa
    /// as redirecionamentos para o BSP e inicializa o LAPIC local.
    pub fn init(table: &'static InterruptTable, madt: &MadtInfo) -> Option<&'static Self> {
        // MMIO sem cache, antes de qualquer clone de diretório
        let mmio = PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::NO_CACHE;
        vmm::map_kernel_page(madt.lapic_base, madt.lapic_base, mmio)?;
        vmm::map_kernel_page(madt.ioapic_base, madt.ioapic_base, mmio)?;

        lapic::set_base(madt.lapic_base);

        // O 8259 não participa: mascarar tudo
        if madt.has_8259 {
            crate::interrupt::pic8259::Pic8259::disable_all();
        }

        let vector_base = table.register_irqs(0, 16)?;
        let ioapic = unsafe { IoApic::new(madt.ioapic_base) };

        unsafe { lapic::init_current(SPURIOUS_VECTOR) };
        let bsp_id = lapic::current_id();

        // IRQ legada i → vetor base+i, entregue ao BSP, mascarada até
        // o driver pedir o contrário
        let irq0_gsi = if madt.irq0_gsi != 0 { madt.irq0_gsi } else { 0 };
        for irq in 0..16u32 {
            let gsi = if irq == 0 { irq0_gsi } else { irq };
            ioapic.set_redirect(gsi, vector_base.number() + irq as u8, bsp_id, true);
        }

        let apic = crate::mm::new_one(Apic {
            ioapic,
            vector_base,
            lapic_ids: madt.lapic_ids,
            cpu_count: madt.cpu_count.max(1),
            irq0_gsi,
        })?;

        crate::kinfo!(
            "(APIC) Pronto, cpus=",
            apic.cpu_count as u64,
            " base IRQ no vetor ",
            vector_base.number()
        );
        Some(apic)
    }

    fn irq_to_gsi(&self, irq: u32) -> u32 {
        if irq == 0 {
            self.irq0_gsi
        } else {
            irq
        }
    }

    /// LAPIC IDs enumerados (para o bringup de APs).
    pub fn lapic_ids(&self) -> &[u8] {
        &self.lapic_ids[..self.cpu_count]
    }

    /// INIT IPI para o núcleo alvo.
    pub unsafe fn interprocessor_init(&self, apic_id: u32) {
        lapic::interprocessor_init(apic_id);
    }

    /// STARTUP IPI: o AP acorda executando em `entry_page << 12`.
    pub unsafe fn interprocessor_startup(&self, apic_id: u32, entry_page: u8) {
        lapic::interprocessor_startup(apic_id, entry_page);
    }
}

impl Pic for Apic {
    fn set_mask(&self, irq: u32, masked: bool) {
        debug_assert!(irq < 16);
        self.ioapic.set_masked(self.irq_to_gsi(irq), masked);
    }

    fn irq_to_vector(&self, irq: u32) -> &'static InterruptVector {
        debug_assert!(irq < 16);
        crate::interrupt::system_table().vector_at(self.vector_base, irq)
    }

    fn end_of_interrupt(&self, _vector: &InterruptVector) {
        lapic::eoi();
    }

    fn interrupt_all_other(&self, vector: &InterruptVector) {
        lapic::interrupt_all_excluding_self(vector.number());
    }

    fn number_of_processors(&self) -> u32 {
        self.cpu_count as u32
    }
}

//! Entry Point Lógico do Kernel.
//!
//! Orquestra a inicialização do BSP na ordem de dependência:
//! CPU → memória → console → GDT → IDT → syscall → tasks → PIC →
//! timer per-CPU → drivers → APs. Os APs repetem a sequência a partir
//! da GDT (ver `core::smp::bringup`).

use crate::arch::x86::acpi;
use crate::arch::x86::gdt::SegmentTable;
use crate::arch::Cpu;
use crate::core::handoff::BootInfo;
use crate::core::smp::percpu;
use crate::core::time::events::{install_timer_handler, TimerEventList};
use crate::core::time::TIMER_FREQUENCY;
use crate::drivers::{console, ps2, serial, timer};
use crate::interrupt::pic::TIMER_IRQ;
use crate::interrupt::pic8259::Pic8259;
use crate::interrupt::Pic;
use crate::sched::scheduler::{self, TaskManager};

/// Função principal do Kernel (BSP). Chamada pelo `_start` naked com os
/// registradores do Multiboot.
#[no_mangle]
pub extern "C" fn kernel_entry(magic: u32, info_addr: u32) -> ! {
    // 1. Logs na serial o quanto antes
    serial::init();
    crate::kinfo!("==========================================");
    crate::kinfo!("Redstone OS Kernel (Brasa) - Initializing");

    // 2. Mapa de memória do loader
    let Some(boot_info) = BootInfo::from_multiboot(magic, info_addr) else {
        crate::kerror!("(Boot) Handoff invalido - congelando");
        Cpu::hang();
    };

    // 3. Memória (Buddy, Heap, Paging)
    crate::mm::init(&boot_info);

    // 4. Console de diagnóstico
    console::init();
    console::printk_string("Brasa Kernel\n");

    // 5. Segmentação + TSS do BSP
    let gdt: &'static mut SegmentTable =
        crate::mm::new_one(SegmentTable::new()).expect("sem memoria para a GDT");
    unsafe { gdt.load() };
    let gdt: &'static SegmentTable = gdt;

    // 6. Tabela de vetores + IDT
    let interrupt_table = crate::interrupt::init();

    // 7. Tabela de syscalls no vetor 126
    crate::syscall::init(interrupt_table);

    // 8. Self-tests (antes de qualquer interrupção ou task extra)
    #[cfg(feature = "self_test")]
    run_self_tests();

    // 9. Controlador de interrupções: APIC quando enumerável, senão 8259
    let madt = acpi::find_madt();
    let use_apic = cfg!(feature = "smp") && Cpu::has_local_apic() && madt.is_some();

    let (pic, apic): (&'static dyn Pic, Option<&'static crate::interrupt::apic::Apic>) =
        if use_apic {
            let apic = crate::interrupt::apic::Apic::init(interrupt_table, &madt.unwrap())
                .expect("falha ao inicializar o APIC");
            (apic, Some(apic))
        } else {
            let pic = Pic8259::init(interrupt_table).expect("falha ao inicializar o 8259");
            (pic, None)
        };

    // 10. Registros per-CPU + scheduler do BSP
    percpu::init_processor_local(pic.number_of_processors() as usize);
    let task_manager =
        TaskManager::init_for_this_cpu("idle0").expect("sem memoria para o TaskManager");
    let bsp_timer: &'static TimerEventList =
        crate::mm::new_one(TimerEventList::new(true)).expect("sem memoria para o timer");
    percpu::set_processor_local(pic, gdt, task_manager, bsp_timer);

    // 11. Tick de 100 Hz no BSP: PIT → vetor da IRQ 0
    let timer_vector = pic.irq_to_vector(TIMER_IRQ);
    install_timer_handler(bsp_timer, timer_vector);
    timer::set_timer_frequency(TIMER_FREQUENCY);
    pic.set_mask(TIMER_IRQ, false);

    // 12. Drivers como tasks de kernel
    ps2::init(pic);

    // 13. Grande Salto (Enable Interrupts)
    crate::kinfo!("(Init) Habilitando interrupcoes - sistema vivo");
    Cpu::enable_interrupts();

    // 14. APs (a calibração do LAPIC precisa do tick do PIT rodando)
    #[cfg(feature = "smp")]
    if let Some(apic) = apic {
        crate::core::smp::bringup::start_aps(apic, interrupt_table, bsp_timer);
    }
    #[cfg(not(feature = "smp"))]
    let _ = apic;

    // O fluxo de boot é a task idle do BSP
    scheduler::idle_loop()
}

/// Roda todas as suítes de self-test. Qualquer falha congela o kernel.
#[cfg(feature = "self_test")]
fn run_self_tests() {
    crate::mm::test::run_mm_tests();
    crate::sync::test::run_sync_tests();
    crate::interrupt::test::run_interrupt_tests();
    crate::core::time::test::run_time_tests();
    crate::sched::test::run_sched_tests();
    crate::syscall::test::run_syscall_tests();
}

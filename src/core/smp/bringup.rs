//! Bringup de APs (Application Processors).
//!
//! Sequência INIT-SIPI-SIPI por núcleo: um trampolim de modo real é
//! copiado para uma página baixa fixa; o mailbox (CR3, stack, entry)
//! fica em offsets conhecidos da mesma página. O AP entra em modo
//! protegido com paginação, repete a inicialização a partir da GDT
//! (GDT própria → IDT → LAPIC → TaskManager → timer local) e se
//! registra na barreira de chegada.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::arch::x86::gdt::SegmentTable;
use crate::arch::Cpu;
use crate::core::smp::percpu;
use crate::core::time::events::{tick_handler, TimerEventList};
use crate::interrupt::apic::{lapic, Apic};
use crate::interrupt::{InterruptTable, SPURIOUS_VECTOR};
use crate::mm::buddy;
use crate::sched::scheduler::TaskManager;
use crate::sync::{Barrier, Once};

/// Página física (< 1 MiB, alinhada) que recebe o trampolim.
const TRAMPOLINE_BASE: u32 = 0x8000;
/// Vetor SIPI correspondente (base >> 12).
const TRAMPOLINE_SIPI_PAGE: u8 = (TRAMPOLINE_BASE >> 12) as u8;

// Mailbox em offsets fixos da página do trampolim
const MAILBOX_CR3: u32 = 0x8F00;
const MAILBOX_STACK: u32 = 0x8F04;
const MAILBOX_ENTRY: u32 = 0x8F08;
const MAILBOX_GDTR: u32 = 0x8F10;
const MAILBOX_GDT: u32 = 0x8F20;

/// Ordem de buddy da stack de cada AP (2^2 páginas = 16 KiB).
const AP_STACK_ORDER: usize = 2;

/// Núcleos que completaram o próprio init.
static AP_ONLINE: Barrier = Barrier::new();
/// Referências compartilhadas com os APs.
static SHARED: Once<ApShared> = Once::new();
/// Contagem do timer LAPIC para um tick de 10 ms (medida no BSP).
static LAPIC_TICKS_PER_TICK: AtomicU32 = AtomicU32::new(0);

struct ApShared {
    apic: &'static Apic,
    table: &'static InterruptTable,
}

core::arch::global_asm!(
    r#"
.section .text
.code16
.global ap_trampoline_start
ap_trampoline_start:
    cli
    xor ax, ax
    mov ds, ax
    lgdt [0x8F10]

    // Modo protegido (CR0.PE)
    mov eax, cr0
    or al, 1
    mov cr0, eax

    // Far jump de 32 bits para o trecho protegido (endereço absoluto
    // da cópia em 0x8000)
    .byte 0x66, 0xEA
    .long 0x8000 + (ap_trampoline_pm - ap_trampoline_start)
    .word 0x08

.code32
ap_trampoline_pm:
    mov ax, 0x10
    mov ds, ax
    mov es, ax
    mov ss, ax

    // Paginação com o diretório do kernel
    mov eax, [0x8F00]
    mov cr3, eax
    mov eax, cr0
    or eax, 0x80010000
    mov cr0, eax

    // Stack própria e salto para o Rust
    mov esp, [0x8F04]
    xor ebp, ebp
    mov eax, [0x8F08]
    call eax

1:  cli
    hlt
    jmp 1b

.global ap_trampoline_end
ap_trampoline_end:
.code32
"#
);

extern "C" {
    static ap_trampoline_start: u8;
    static ap_trampoline_end: u8;
}

/// Calibra o timer LAPIC contra o PIT do BSP (que já está em 100 Hz):
/// mede quantas contagens o LAPIC consome em 10 ticks.
fn calibrate_lapic_timer(bsp_timer: &TimerEventList) -> u32 {
    lapic::timer_start_calibration();
    bsp_timer.kernel_sleep(100);
    let per_tick = lapic::timer_elapsed() / 10;
    crate::kinfo!("(SMP) LAPIC timer, contagens por tick=", per_tick);
    per_tick.max(1)
}

unsafe fn install_trampoline() {
    let start = core::ptr::addr_of!(ap_trampoline_start) as usize;
    let end = core::ptr::addr_of!(ap_trampoline_end) as usize;
    core::ptr::copy_nonoverlapping(
        start as *const u8,
        TRAMPOLINE_BASE as *mut u8,
        end - start,
    );

    // GDT temporária: null, code flat 32, data flat 32
    let gdt = MAILBOX_GDT as *mut u64;
    gdt.write(0);
    gdt.add(1).write(0x00CF_9A00_0000_FFFF);
    gdt.add(2).write(0x00CF_9200_0000_FFFF);

    // GDTR: limite 23, base na própria página (base fica desalinhada)
    (MAILBOX_GDTR as *mut u16).write(23);
    ((MAILBOX_GDTR + 2) as *mut u32).write_unaligned(MAILBOX_GDT);

    (MAILBOX_CR3 as *mut u32).write(crate::mm::vmm::kernel_cr3());
    (MAILBOX_ENTRY as *mut u32).write(ap_main as usize as u32);
}

/// Acorda todos os APs enumerados. Chamado no BSP, com interrupções
/// habilitadas e o tick do PIT já rodando (a calibração e os atrasos
/// usam `kernel_sleep`).
pub fn start_aps(
    apic: &'static Apic,
    table: &'static InterruptTable,
    bsp_timer: &'static TimerEventList,
) {
    use crate::interrupt::Pic;

    let total = apic.number_of_processors();
    if total <= 1 {
        return;
    }

    SHARED.call_once(|| ApShared { apic, table });
    LAPIC_TICKS_PER_TICK.store(calibrate_lapic_timer(bsp_timer), Ordering::Relaxed);

    unsafe { install_trampoline() };
    AP_ONLINE.reset();

    let bsp_id = lapic::current_id();
    let mut expected = 0u32;

    for &apic_id in apic.lapic_ids() {
        let apic_id = apic_id as u32;
        if apic_id == bsp_id {
            continue;
        }

        let Some(stack) = buddy::alloc_frames(AP_STACK_ORDER) else {
            crate::kerror!("(SMP) Sem memoria para stack do AP ", apic_id);
            continue;
        };
        let stack_top = stack + ((crate::mm::PAGE_SIZE as u32) << AP_STACK_ORDER);
        unsafe { (MAILBOX_STACK as *mut u32).write(stack_top) };

        crate::kinfo!("(SMP) Acordando AP, LAPIC id=", apic_id);
        unsafe {
            apic.interprocessor_init(apic_id);
            bsp_timer.kernel_sleep(10);
            apic.interprocessor_startup(apic_id, TRAMPOLINE_SIPI_PAGE);
            bsp_timer.kernel_sleep(10);
            apic.interprocessor_startup(apic_id, TRAMPOLINE_SIPI_PAGE);
        }

        expected += 1;
        // Esperar este AP ficar online antes de reusar o mailbox
        let mut tries = 0;
        while AP_ONLINE.count() < expected && tries < 100 {
            bsp_timer.kernel_sleep(10);
            tries += 1;
        }
        if AP_ONLINE.count() < expected {
            crate::kwarn!("(SMP) AP nao respondeu, LAPIC id=", apic_id);
            expected -= 1;
        }
    }

    crate::kinfo!("(SMP) Nucleos online (alem do BSP): ", AP_ONLINE.count());
}

/// Entrada Rust de cada AP: repete a inicialização a partir da GDT.
extern "C" fn ap_main() -> ! {
    let shared = SHARED.get().expect("bringup sem estado compartilhado");

    // 1. GDT + TSS próprios
    let gdt: &'static mut SegmentTable =
        crate::mm::new_one(SegmentTable::new()).expect("sem memoria para GDT do AP");
    unsafe { gdt.load() };

    // 2. IDT compartilhada
    crate::interrupt::load_on_ap();

    // 3. LAPIC local
    unsafe { lapic::init_current(SPURIOUS_VECTOR) };

    // 4. TaskManager + lista de timer deste núcleo
    let tm = TaskManager::init_for_this_cpu("idle-ap").expect("sem memoria para TaskManager");
    let timer: &'static TimerEventList =
        crate::mm::new_one(TimerEventList::new(false)).expect("sem memoria para timer do AP");

    percpu::set_processor_local(shared.apic, gdt, tm, timer);

    // 5. Tick local: vetor próprio + timer LAPIC periódico
    let vector = shared
        .table
        .register_general_interrupt(tick_handler, timer as *const TimerEventList as usize)
        .expect("sem vetor livre para o timer do AP");
    lapic::timer_set_periodic(
        vector.number(),
        LAPIC_TICKS_PER_TICK.load(Ordering::Relaxed),
    );

    crate::kinfo!("(SMP) AP online, LAPIC id=", lapic::current_id());
    AP_ONLINE.add();

    Cpu::enable_interrupts();
    crate::sched::scheduler::idle_loop()
}

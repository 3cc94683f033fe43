//! Registros Por-Processador (ProcessorLocal).
//!
//! Cada núcleo possui a quádrupla `(PIC, GDT, TaskManager, Timer)`,
//! indexada pelo LAPIC ID (ou pelo índice fixo 0 em uniprocessador).
//! Uma vez instalados, os ponteiros são estáveis pela vida do núcleo.
//!
//! Disciplina de acesso: os getters desabilitam interrupções durante a
//! leitura (se estavam ligadas): garante que o valor retornado é do
//! núcleo que executou a chamada, sem preempção no meio.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::arch::cpu::IntGuard;
use crate::arch::x86::gdt::SegmentTable;
use crate::core::time::events::TimerEventList;
use crate::interrupt::Pic;
use crate::sched::scheduler::TaskManager;
use crate::sched::task::Task;
use crate::sync::Once;

/// Número máximo de núcleos suportados (limite do array de registros).
pub const MAX_CPUS: usize = 32;

/// Registro de um núcleo. Os campos são escritos uma única vez pelo
/// próprio núcleo durante o bringup.
pub struct ProcessorLocal {
    pic: UnsafeCell<Option<&'static dyn Pic>>,
    gdt: UnsafeCell<Option<&'static SegmentTable>>,
    task_manager: UnsafeCell<Option<&'static TaskManager>>,
    timer: UnsafeCell<Option<&'static TimerEventList>>,
}

// SAFETY: cada núcleo só escreve o próprio slot; leituras seguem a
// disciplina de IF desligado.
unsafe impl Sync for ProcessorLocal {}
unsafe impl Send for ProcessorLocal {}

impl Default for ProcessorLocal {
    fn default() -> Self {
        Self {
            pic: UnsafeCell::new(None),
            gdt: UnsafeCell::new(None),
            task_manager: UnsafeCell::new(None),
            timer: UnsafeCell::new(None),
        }
    }
}

static TABLE: Once<&'static [ProcessorLocal]> = Once::new();
static UNIPROCESSOR: AtomicBool = AtomicBool::new(true);

/// Aloca o array de registros zerado. `max_cpus == 1` fixa o índice 0
/// (não depende do LAPIC existir).
pub fn init_processor_local(max_cpus: usize) {
    let count = max_cpus.clamp(1, MAX_CPUS);
    UNIPROCESSOR.store(count == 1, Ordering::Relaxed);
    TABLE.call_once(|| {
        crate::mm::new_array::<ProcessorLocal>(MAX_CPUS.max(count))
            .expect("sem memoria para os registros per-CPU")
    });
    crate::kinfo!("(PerCPU) Registros alocados, max_cpus=", count as u64);
}

fn current_index() -> usize {
    if UNIPROCESSOR.load(Ordering::Relaxed) {
        0
    } else {
        let id = crate::interrupt::apic::lapic::current_id() as usize;
        debug_assert!(id < MAX_CPUS);
        id.min(MAX_CPUS - 1)
    }
}

fn local() -> &'static ProcessorLocal {
    let table = TABLE.get().expect("per-CPU nao inicializado");
    &table[current_index()]
}

/// Instala a quádrupla do núcleo atual.
pub fn set_processor_local(
    pic: &'static dyn Pic,
    gdt: &'static SegmentTable,
    task_manager: &'static TaskManager,
    timer: &'static TimerEventList,
) {
    let _guard = IntGuard::new();
    let slot = local();
    unsafe {
        *slot.pic.get() = Some(pic);
        *slot.gdt.get() = Some(gdt);
        *slot.task_manager.get() = Some(task_manager);
        *slot.timer.get() = Some(timer);
    }
}

// =============================================================================
// GETTERS
// =============================================================================

pub fn processor_local_pic() -> &'static dyn Pic {
    let _guard = IntGuard::new();
    unsafe { (*local().pic.get()).expect("PIC per-CPU nao instalado") }
}

pub fn try_processor_local_pic() -> Option<&'static dyn Pic> {
    let _guard = IntGuard::new();
    let table = TABLE.get()?;
    unsafe { *table[current_index()].pic.get() }
}

pub fn processor_local_gdt() -> &'static SegmentTable {
    let _guard = IntGuard::new();
    unsafe { (*local().gdt.get()).expect("GDT per-CPU nao instalada") }
}

pub fn processor_local_task_manager() -> &'static TaskManager {
    let _guard = IntGuard::new();
    unsafe {
        (*local().task_manager.get()).expect("TaskManager per-CPU nao instalado")
    }
}

pub fn try_processor_local_task_manager() -> Option<&'static TaskManager> {
    let _guard = IntGuard::new();
    let table = TABLE.get()?;
    unsafe { *table[current_index()].task_manager.get() }
}

pub fn processor_local_timer() -> &'static TimerEventList {
    let _guard = IntGuard::new();
    unsafe { (*local().timer.get()).expect("Timer per-CPU nao instalado") }
}

/// Ponteiro estável para a task corrente do núcleo.
pub fn processor_local_task() -> Option<*const Task> {
    let _guard = IntGuard::new();
    let tm = unsafe { (*local().task_manager.get())? };
    tm.current_task_ptr()
}

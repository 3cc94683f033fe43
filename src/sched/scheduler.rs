//! # Orquestrador de Agendamento
//!
//! Um `TaskManager` por núcleo: a task corrente, as filas de prontos e o
//! slot de zumbi (task terminada aguardando liberação em outra stack).
//!
//! ## Sincronização
//! - `current`/`zombie`: tocados apenas pelo núcleo dono, com
//!   interrupções desabilitadas.
//! - `runqueue`: spinlock: `resume` de outro núcleo (release de
//!   semáforo) empurra tasks para cá.
//!
//! ## Por que o bloqueio é seguro em SMP
//! Quem bloqueia publica a própria task numa fila de espera ANTES de
//! salvar o contexto. Outro núcleo pode dar `release` imediatamente,
//! mas `resume` apenas devolve a task à fila de prontos do núcleo DONO
//!: e o dono está ocupado executando o próprio switch; só vai
//! reescalonar a task depois que o salvamento do contexto terminou.
//! Tasks não migram de núcleo (modelo base), então nenhum terceiro pode
//! executá-la antes disso.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::pin::Pin;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::arch::cpu::IntGuard;
use crate::arch::Cpu;
use crate::sched::runqueue::RunQueue;
use crate::sched::switch::{self, CpuContext};
use crate::sched::task::{Task, TaskEntry, Tid};
use crate::sync::Spinlock;

/// Estado de agendamento de um núcleo.
pub struct TaskManager {
    runqueue: Spinlock<RunQueue>,
    current: UnsafeCell<Option<Pin<Box<Task>>>>,
    zombie: UnsafeCell<Option<Pin<Box<Task>>>>,
}

// SAFETY: `current`/`zombie` seguem a disciplina per-CPU + CLI;
// `runqueue` tem o próprio lock.
unsafe impl Sync for TaskManager {}
unsafe impl Send for TaskManager {}

impl TaskManager {
    /// Cria o gerente do núcleo atual e adota o fluxo de boot como a
    /// task idle dele. Retorna `None` em exaustão de memória.
    pub fn init_for_this_cpu(idle_name: &str) -> Option<&'static TaskManager> {
        let tm = crate::mm::new_one(TaskManager {
            runqueue: Spinlock::new(RunQueue::new()),
            current: UnsafeCell::new(None),
            zombie: UnsafeCell::new(None),
        })?;
        let tm: &'static TaskManager = tm;

        let idle = Task::adopt_boot(idle_name, tm);
        unsafe { *tm.current.get() = Some(idle) };
        Some(tm)
    }

    #[allow(clippy::mut_from_ref)]
    unsafe fn current_slot(&self) -> &mut Option<Pin<Box<Task>>> {
        &mut *self.current.get()
    }

    /// Libera o zumbi pendente (nunca é a task cuja stack está em uso).
    fn reap_zombie(&self) {
        unsafe {
            (*self.zombie.get()).take();
        }
    }

    /// Enfileira uma task pronta (chamável de qualquer núcleo).
    fn enqueue(&self, task: Pin<Box<Task>>) {
        self.runqueue.lock().push(task);
    }

    /// Ponteiro estável para a task corrente deste núcleo.
    pub fn current_task_ptr(&self) -> Option<*const Task> {
        unsafe {
            (*self.current.get())
                .as_ref()
                .map(|t| t.as_ref().get_ref() as *const Task)
        }
    }

    /// Instala `next` como corrente e devolve o ponteiro do contexto a
    /// restaurar. IF desligado.
    unsafe fn install(&self, mut next: Pin<Box<Task>>) -> *const CpuContext {
        Pin::get_unchecked_mut(next.as_mut()).set_running();
        next.apply_hardware_state();
        let ctx = &next.context as *const CpuContext;
        *self.current_slot() = Some(next);
        ctx
    }
}

fn tm() -> &'static TaskManager {
    crate::core::smp::percpu::processor_local_task_manager()
}

fn try_tm() -> Option<&'static TaskManager> {
    crate::core::smp::percpu::try_processor_local_task_manager()
}

// =============================================================================
// AGENDAMENTO
// =============================================================================

/// Troca para a próxima task elegível, se houver uma de prioridade igual
/// ou superior (round-robin dentro da prioridade). A corrente volta para
/// o fim da fila dela.
///
/// Precondição: interrupções desabilitadas. Retorna quando a task
/// chamadora for re-escalonada.
pub fn schedule() {
    debug_assert!(!Cpu::interrupts_enabled());
    let tm = tm();

    unsafe {
        tm.reap_zombie();

        let slot = tm.current_slot();
        let Some(current_ref) = slot.as_ref() else {
            return;
        };
        let current_priority = current_ref.priority;

        let Some(next) = tm.runqueue.lock().pop_higher_or_equal(current_priority) else {
            return;
        };

        let (new_ctx, old_ctx) = tm.install_replacing(next, slot);
        // `install_replacing` já devolveu a anterior para a fila
        switch::switch_context(old_ctx, new_ctx);
    }
}

impl TaskManager {
    /// Passo comum da preempção: instala `next`, marca a anterior como
    /// pronta e a devolve à fila. Retorna (novo_ctx, ctx_da_anterior).
    unsafe fn install_replacing(
        &self,
        mut next: Pin<Box<Task>>,
        slot: &mut Option<Pin<Box<Task>>>,
    ) -> (*const CpuContext, *mut CpuContext) {
        Pin::get_unchecked_mut(next.as_mut()).set_running();
        next.apply_hardware_state();
        let new_ctx = &next.context as *const CpuContext;

        let mut previous = slot.replace(next).expect("slot vazio em preempcao");
        Pin::get_unchecked_mut(previous.as_mut()).set_ready();
        let old_ctx =
            &mut Pin::get_unchecked_mut(previous.as_mut()).context as *mut CpuContext;
        self.enqueue(previous);

        (new_ctx, old_ctx)
    }
}

/// Cede a CPU voluntariamente.
pub fn yield_now() {
    let interrupt_enabled = Cpu::interrupts_enabled();
    Cpu::disable_interrupts();
    schedule();
    if interrupt_enabled {
        Cpu::enable_interrupts();
    }
}

/// Retira a task atual do núcleo e a entrega ao chamador (fila de espera
/// de semáforo, registro de suspensas). Troca para a próxima pronta e
/// retorna quando a task for retomada.
///
/// Precondição: interrupções desabilitadas; a task idle nunca bloqueia.
pub fn block_current(park: impl FnOnce(Pin<Box<Task>>)) {
    debug_assert!(!Cpu::interrupts_enabled());
    let tm = tm();

    unsafe {
        tm.reap_zombie();

        let mut task = tm
            .current_slot()
            .take()
            .expect("bloqueio sem task corrente");
        debug_assert!(
            !matches!(task.entry, TaskEntry::BootIdle),
            "task idle tentou bloquear"
        );
        Pin::get_unchecked_mut(task.as_mut()).set_suspended();
        let old_ctx = &mut Pin::get_unchecked_mut(task.as_mut()).context as *mut CpuContext;

        // A task fica visível para `resume` a partir daqui; ver o
        // comentário de módulo sobre por que isso é seguro.
        park(task);

        let next = tm
            .runqueue
            .lock()
            .pop_next()
            .expect("fila de prontos vazia (idle sumiu)");
        let new_ctx = tm.install(next);
        switch::switch_context(old_ctx, new_ctx);
    }
}

/// Marca uma task como pronta e a devolve à fila do núcleo dono.
pub fn resume(mut task: Pin<Box<Task>>) {
    unsafe {
        Pin::get_unchecked_mut(task.as_mut()).set_ready();
    }
    let home = task.home();
    home.enqueue(task);
}

/// Termina a task atual: libera a memória de usuário, estaciona o
/// registro no slot de zumbi (liberado na próxima troca, em outra
/// stack) e nunca retorna.
pub fn terminate_current() -> ! {
    Cpu::disable_interrupts();
    let tm = tm();

    unsafe {
        tm.reap_zombie();

        let mut task = tm
            .current_slot()
            .take()
            .expect("terminate sem task corrente");
        Pin::get_unchecked_mut(task.as_mut()).set_terminated();
        Pin::get_unchecked_mut(task.as_mut()).release_user_memory();
        *tm.zombie.get() = Some(task);

        let next = tm
            .runqueue
            .lock()
            .pop_next()
            .expect("fila de prontos vazia (idle sumiu)");
        let new_ctx = tm.install(next);
        switch::jump_context(new_ctx);
    }
}

// =============================================================================
// SUSPENSÃO EXPLÍCITA (syscall SUSPEND)
// =============================================================================

/// Tasks suspensas por SYSCALL_SUSPEND, indexadas por TID.
static PARKED: Spinlock<Vec<(Tid, Pin<Box<Task>>)>> = Spinlock::new(Vec::new());

/// Suspende a task atual até alguém chamar `resume_parked(tid)`.
pub fn suspend_current() {
    let interrupt_enabled = Cpu::interrupts_enabled();
    Cpu::disable_interrupts();

    block_current(|task| {
        let tid = task.tid();
        PARKED.lock().push((tid, task));
    });

    if interrupt_enabled {
        Cpu::enable_interrupts();
    }
}

/// Retoma uma task suspensa explicitamente. `false` se o TID não está
/// suspenso.
pub fn resume_parked(tid: Tid) -> bool {
    let mut parked = PARKED.lock();
    if let Some(index) = parked.iter().position(|(t, _)| *t == tid) {
        let (_, task) = parked.remove(index);
        drop(parked);
        resume(task);
        true
    } else {
        false
    }
}

// =============================================================================
// ACESSO À TASK CORRENTE
// =============================================================================

/// Executa `f` com acesso exclusivo à task corrente (IF desligado).
pub fn with_current<R>(f: impl FnOnce(&mut Task) -> R) -> R {
    let _guard = IntGuard::new();
    let tm = tm();
    unsafe {
        let current = tm
            .current_slot()
            .as_mut()
            .expect("nucleo sem task corrente");
        f(Pin::get_unchecked_mut(current.as_mut()))
    }
}

/// TID da task corrente.
pub fn current_tid() -> Tid {
    with_current(|task| task.tid())
}

/// Ponto de entrada da task corrente (lido pelo trampolim).
pub fn current_entry() -> TaskEntry {
    with_current(|task| task.entry)
}

/// Primeira coisa que uma task nova faz: liberar o zumbi anterior.
/// (IF ainda desligado.)
pub fn finish_switch() {
    tm().reap_zombie();
}

/// Loop da task idle de cada núcleo.
pub fn idle_loop() -> ! {
    loop {
        Cpu::halt();
    }
}

// =============================================================================
// NÍVEL DE ANINHAMENTO DE INTERRUPÇÕES
// =============================================================================
//
// O contador vive na task corrente (viaja com a stack nas trocas de
// contexto). Antes do init do scheduler, um contador de boot serve de
// fallback: exceções nesse estágio terminam em pânico de todo jeito.

static BOOT_NEST: AtomicU32 = AtomicU32::new(0);

/// Contagem bruta de dispatches aninhados da task corrente.
pub fn current_irq_nest() -> u32 {
    let _guard = IntGuard::new();
    match try_tm() {
        Some(tm) => unsafe {
            match (*tm.current.get()).as_ref() {
                Some(task) => task.irq_nest.get(),
                None => BOOT_NEST.load(Ordering::Relaxed),
            }
        },
        None => BOOT_NEST.load(Ordering::Relaxed),
    }
}

/// Ajusta a contagem (chamado pelo dispatch na entrada/saída).
pub fn adjust_irq_nest(delta: i32) {
    let _guard = IntGuard::new();
    match try_tm() {
        Some(tm) => unsafe {
            match (*tm.current.get()).as_ref() {
                Some(task) => {
                    let value = task.irq_nest.get() as i32 + delta;
                    task.irq_nest.set(value.max(0) as u32);
                }
                None => {
                    let value = BOOT_NEST.load(Ordering::Relaxed) as i32 + delta;
                    BOOT_NEST.store(value.max(0) as u32, Ordering::Relaxed);
                }
            }
        },
        None => {
            let value = BOOT_NEST.load(Ordering::Relaxed) as i32 + delta;
            BOOT_NEST.store(value.max(0) as u32, Ordering::Relaxed);
        }
    }
}

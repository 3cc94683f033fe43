//! Semáforo contador bloqueante.
//!
//! Ao contrário do `Spinlock`, quem não consegue quota NÃO gira: a task
//! entra numa fila FIFO dentro do semáforo e cede a CPU. `release` acorda
//! estritamente a cabeça da fila (sem reordenação), devolvendo-a à fila
//! de prontos do núcleo de origem: em SMP a ordem global de wakeup é a
//! ordem única da fila, e tasks não migram de núcleo.
//!
//! Invariantes:
//! - `quota >= 0` sempre;
//! - fila de espera não-vazia ⇒ `quota == 0` (um release com fila
//!   transfere a permissão diretamente para o primeiro da fila).

use alloc::collections::VecDeque;
use core::pin::Pin;

use alloc::boxed::Box;

use crate::arch::Cpu;
use crate::sched::scheduler;
use crate::sched::task::Task;
use crate::sync::Spinlock;

struct SemInner {
    quota: i32,
    waiters: VecDeque<Pin<Box<Task>>>,
}

/// Semáforo de contagem com fila FIFO de tasks bloqueadas.
pub struct Semaphore {
    inner: Spinlock<SemInner>,
}

impl Semaphore {
    /// Cria um semáforo com a quota inicial dada (>= 0).
    pub const fn new(initial_quota: i32) -> Self {
        Self {
            inner: Spinlock::new(SemInner {
                quota: initial_quota,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Decrementa (P/wait/acquire). Bloqueia a task atual se não há quota.
    ///
    /// Protocolo (com IF desligado durante toda a manobra):
    /// 1. adquirir o lock interno;
    /// 2. com quota: decrementar e soltar o lock;
    /// 3. sem quota: enfileirar a task atual, soltar o lock e escalonar.
    ///
    /// No retorno o IF original do chamador é restaurado.
    pub fn acquire(&self) {
        let interrupt_enabled = Cpu::interrupts_enabled();
        Cpu::disable_interrupts();

        let mut inner = self.inner.lock();
        if inner.quota > 0 {
            inner.quota -= 1;
            drop(inner);
        } else {
            // Bloquear: a posse da task migra para a fila do semáforo
            // ANTES da troca de contexto; o lock é solto em seguida.
            // Quem nos retomar é um `release` futuro: a permissão vem
            // transferida, não há quota para reverificar.
            scheduler::block_current(move |task| {
                inner.waiters.push_back(task);
                drop(inner);
            });
        }

        if interrupt_enabled {
            Cpu::enable_interrupts();
        }
    }

    /// Tenta decrementar sem bloquear.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.quota > 0 {
            inner.quota -= 1;
            true
        } else {
            false
        }
    }

    /// Incrementa (V/signal/release). Seguro em contexto de interrupção
    /// (nunca bloqueia).
    ///
    /// Com fila não-vazia, acorda a cabeça (FIFO estrito) em vez de
    /// incrementar a quota.
    pub fn release(&self) {
        let interrupt_enabled = Cpu::interrupts_enabled();
        Cpu::disable_interrupts();

        let mut inner = self.inner.lock();
        if let Some(task) = inner.waiters.pop_front() {
            scheduler::resume(task);
        } else {
            inner.quota += 1;
        }
        drop(inner);

        if interrupt_enabled {
            Cpu::enable_interrupts();
        }
    }

    /// Quota disponível no momento (diagnóstico/testes).
    pub fn quota(&self) -> i32 {
        self.inner.lock().quota
    }

    /// Número de tasks esperando (diagnóstico/testes).
    pub fn waiter_count(&self) -> usize {
        self.inner.lock().waiters.len()
    }
}

//! Lista de eventos de timer por núcleo, sleep e alarmes.
//!
//! Cada núcleo tem uma `TimerEventList` tocada apenas em contexto de
//! handler de timer e pela task emissora com interrupções desabilitadas
//! (nenhum lock além de CLI). A cada tick todo evento tem `remaining`
//! decrementado; ao chegar a zero é desencadeado e o callback dispara.
//!
//! Callbacks rodam com IF desligado, não podem bloquear nem tocar a
//! própria lista; devem retornar rápido.

use alloc::collections::BTreeMap;
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::arch::cpu::IntGuard;
use crate::arch::x86::entry::TrapFrame;
use crate::arch::Cpu;
use crate::core::smp::percpu;
use crate::core::time::millis_to_ticks;
use crate::interrupt::{self, InterruptVector};
use crate::sync::{Semaphore, Spinlock};

/// Um evento pendente: callback disparado após `remaining` ticks.
pub struct TimerEvent {
    remaining: i32,
    /// Recarga para eventos periódicos.
    period: i32,
    periodic: bool,
    callback: fn(usize),
    arg: usize,
    /// Identificador para cancelamento (0 = anônimo, não cancelável).
    handle: u32,
}

impl TimerEvent {
    /// Evento avulso de disparo único.
    pub(crate) fn oneshot(ticks: i32, callback: fn(usize), arg: usize, handle: u32) -> Self {
        Self {
            remaining: ticks,
            period: 0,
            periodic: false,
            callback,
            arg,
            handle,
        }
    }
}

/// Lista de eventos de um núcleo.
pub struct TimerEventList {
    events: UnsafeCell<VecDeque<TimerEvent>>,
    /// Apenas a lista do BSP avança o contador global de jiffies.
    counts_jiffies: bool,
}

// SAFETY: acesso exclusivamente com interrupções desabilitadas no
// núcleo dono.
unsafe impl Sync for TimerEventList {}
unsafe impl Send for TimerEventList {}

impl TimerEventList {
    pub fn new(counts_jiffies: bool) -> Self {
        Self {
            events: UnsafeCell::new(VecDeque::with_capacity(16)),
            counts_jiffies,
        }
    }

    /// Liga um evento na lista. Com `remaining <= 0` o callback dispara
    /// imediatamente (inline), sem entrar na lista.
    pub(crate) fn add_event(&self, event: TimerEvent) {
        let _guard = IntGuard::new();
        if event.remaining <= 0 && !event.periodic {
            (event.callback)(event.arg);
            return;
        }
        unsafe { (*self.events.get()).push_back(event) };
    }

    /// Dorme `millis` ms: o evento vive na stack do chamador (um flag
    /// atômico), e a task espera em halt-loop com interrupções ligadas.
    pub fn kernel_sleep(&self, millis: u32) {
        let timed_out = AtomicBool::new(false);
        let ticks = millis_to_ticks(millis) as i32;

        self.add_event(TimerEvent {
            remaining: ticks,
            period: 0,
            periodic: false,
            callback: wake_flag,
            arg: &timed_out as *const AtomicBool as usize,
            handle: 0,
        });

        Cpu::enable_interrupts();
        while !timed_out.load(Ordering::Acquire) {
            Cpu::halt();
        }
    }

    /// Avança um tick: decrementa todos os eventos, desencadeia e
    /// dispara os que chegaram a zero. Chamado só pelo handler do timer.
    pub fn tick(&self) {
        debug_assert!(!Cpu::interrupts_enabled());
        if self.counts_jiffies {
            crate::core::time::inc_jiffies();
        }

        let events = unsafe { &mut *self.events.get() };
        let mut index = 0;
        while index < events.len() {
            events[index].remaining -= 1;
            if events[index].remaining > 0 {
                index += 1;
                continue;
            }
            if events[index].periodic {
                // Re-liga a si mesmo: recarrega e dispara no lugar
                events[index].remaining = events[index].period;
                let (callback, arg) = (events[index].callback, events[index].arg);
                callback(arg);
                index += 1;
            } else {
                let event = events.swap_remove_back(index).unwrap();
                (event.callback)(event.arg);
                // swap_remove trouxe outro evento para `index`; não avançar
            }
        }
    }

    /// Remove um evento pendente pelo handle. `true` se removeu antes
    /// de disparar.
    pub fn cancel(&self, handle: u32) -> bool {
        debug_assert!(handle != 0);
        let _guard = IntGuard::new();
        let events = unsafe { &mut *self.events.get() };
        if let Some(index) = events.iter().position(|e| e.handle == handle) {
            events.swap_remove_back(index);
            true
        } else {
            false
        }
    }

    /// Eventos pendentes (diagnóstico/testes).
    pub fn pending(&self) -> usize {
        let _guard = IntGuard::new();
        unsafe { (*self.events.get()).len() }
    }
}

fn wake_flag(arg: usize) {
    // arg aponta para o flag na stack da task adormecida; ela não
    // retorna antes do disparo, então o ponteiro é válido.
    unsafe { (*(arg as *const AtomicBool)).store(true, Ordering::Release) };
}

// =============================================================================
// HANDLER DE TICK
// =============================================================================

/// Handler do vetor de timer: avança a lista do núcleo, sinaliza EOI e,
/// no nível de aninhamento zero, entrega a CPU ao scheduler ANTES de
/// religar interrupções (ordem única em todo o kernel).
pub fn tick_handler(frame: &mut TrapFrame, arg: usize) {
    let list = unsafe { &*(arg as *const TimerEventList) };
    list.tick();

    let pic = percpu::processor_local_pic();
    pic.end_of_interrupt(interrupt::system_table().vector(frame.vector as u8));

    if interrupt::nest_level() == 0 {
        crate::sched::scheduler::schedule();
    }
}

/// Instala o handler de tick no vetor dado com a lista como argumento.
pub fn install_timer_handler(list: &'static TimerEventList, vector: &InterruptVector) {
    interrupt::replace_handler(vector, tick_handler, list as *const TimerEventList as usize);
}

// =============================================================================
// ALARMES (syscalls setAlarm / waitIO / cancelIO)
// =============================================================================
//
// Um alarme é um evento desacoplado na lista do núcleo emissor mais um
// semáforo: o disparo dá release, `wait_io` dá acquire. Como tasks não
// migram de núcleo, cancelamento e espera acontecem no mesmo núcleo que
// criou o evento.

struct AlarmState {
    sem: Semaphore,
    periodic: bool,
}

static ALARMS: Spinlock<BTreeMap<u32, Arc<AlarmState>>> = Spinlock::new(BTreeMap::new());
static NEXT_HANDLE: AtomicU32 = AtomicU32::new(1);

/// Agenda um alarme em `millis` ms (recorrente se `periodic`).
/// Retorna o handle, ou `IO_REQUEST_FAILURE` (0) em exaustão.
pub fn set_alarm(millis: u32, periodic: bool) -> u32 {
    let ticks = millis_to_ticks(millis).max(1) as i32;
    let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
    if handle == 0 {
        return 0;
    }

    let state = Arc::new(AlarmState {
        sem: Semaphore::new(0),
        periodic,
    });
    ALARMS.lock().insert(handle, state);

    percpu::processor_local_timer().add_event(TimerEvent {
        remaining: ticks,
        period: ticks,
        periodic,
        callback: alarm_fired,
        arg: handle as usize,
        handle,
    });
    handle
}

fn alarm_fired(arg: usize) {
    let handle = arg as u32;
    let state = ALARMS.lock().get(&handle).cloned();
    if let Some(state) = state {
        state.sem.release();
    }
}

/// Bloqueia até o alarme disparar. `false` para handle desconhecido
/// (já consumido ou cancelado).
pub fn wait_io(handle: u32) -> bool {
    let state = ALARMS.lock().get(&handle).cloned();
    let Some(state) = state else {
        return false;
    };
    state.sem.acquire();
    if !state.periodic {
        ALARMS.lock().remove(&handle);
    }
    true
}

/// Tenta cancelar um alarme pendente. `true` sse a remoção venceu o
/// disparo; o perdedor chama `wait_io` normalmente.
pub fn cancel_io(handle: u32) -> bool {
    if handle == 0 {
        return false;
    }
    if percpu::processor_local_timer().cancel(handle) {
        ALARMS.lock().remove(&handle);
        true
    } else {
        false
    }
}

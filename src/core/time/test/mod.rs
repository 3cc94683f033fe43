//! Testes do subsistema de tempo.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::core::time::events::{TimerEvent, TimerEventList};
use crate::core::time::millis_to_ticks;
use crate::drivers::timer::divisor_for;
use crate::klib::test_framework::{run_test_suite, TestCase, TestResult};
use crate::{kassert, kassert_eq};

const TIME_TESTS: &[TestCase] = &[
    TestCase::new("divisor_do_pit", test_pit_divisor),
    TestCase::new("ms_para_ticks", test_millis_to_ticks),
    TestCase::new("disparo_unico_por_evento", test_event_fires_once),
    TestCase::new("disparo_imediato_inline", test_inline_fire),
    TestCase::new("cancelamento", test_cancel),
];

pub fn run_time_tests() {
    run_test_suite("Time", TIME_TESTS);
}

/// 100 Hz → divisor 11932 (0x2E9C): bytes 0x9C e 0x2E.
fn test_pit_divisor() -> TestResult {
    kassert_eq!(divisor_for(100), 11932u16);
    let seq = crate::drivers::timer::command_sequence(100);
    kassert_eq!(seq[1].1, 0x9Cu8);
    kassert_eq!(seq[2].1, 0x2Eu8);

    TestResult::Pass
}

/// Arredondamento para cima: 35 ms a 100 Hz são 4 ticks.
fn test_millis_to_ticks() -> TestResult {
    kassert_eq!(millis_to_ticks(35), 4u32);
    kassert_eq!(millis_to_ticks(10), 1u32);
    kassert_eq!(millis_to_ticks(11), 2u32);
    kassert_eq!(millis_to_ticks(0), 0u32);

    TestResult::Pass
}

static FIRE_COUNT: AtomicU32 = AtomicU32::new(0);

fn count_fire(_arg: usize) {
    FIRE_COUNT.fetch_add(1, Ordering::Relaxed);
}

/// Cada evento dispara exatamente uma vez, no tick `max(t, 1)`.
fn test_event_fires_once() -> TestResult {
    let list = TimerEventList::new(false);
    FIRE_COUNT.store(0, Ordering::Relaxed);

    list.add_event(TimerEvent::oneshot(3, count_fire, 0, 0));
    list.add_event(TimerEvent::oneshot(1, count_fire, 0, 0));

    list.tick(); // tick 1: o evento de 1 tick dispara
    kassert_eq!(FIRE_COUNT.load(Ordering::Relaxed), 1u32);
    list.tick(); // tick 2: nada
    kassert_eq!(FIRE_COUNT.load(Ordering::Relaxed), 1u32);
    list.tick(); // tick 3: o evento de 3 ticks dispara
    kassert_eq!(FIRE_COUNT.load(Ordering::Relaxed), 2u32);
    kassert_eq!(list.pending(), 0usize);

    list.tick(); // lista vazia: nada explode
    kassert_eq!(FIRE_COUNT.load(Ordering::Relaxed), 2u32);

    TestResult::Pass
}

/// Evento com ticks <= 0 dispara inline, sem entrar na lista.
fn test_inline_fire() -> TestResult {
    let list = TimerEventList::new(false);
    FIRE_COUNT.store(0, Ordering::Relaxed);

    list.add_event(TimerEvent::oneshot(0, count_fire, 0, 0));
    kassert_eq!(FIRE_COUNT.load(Ordering::Relaxed), 1u32);
    kassert_eq!(list.pending(), 0usize);

    TestResult::Pass
}

/// Cancelar remove o pendente; cancelar de novo (ou após disparo) falha.
fn test_cancel() -> TestResult {
    let list = TimerEventList::new(false);
    FIRE_COUNT.store(0, Ordering::Relaxed);

    list.add_event(TimerEvent::oneshot(5, count_fire, 0, 42));
    kassert!(list.cancel(42));
    kassert!(!list.cancel(42));
    list.tick();
    kassert_eq!(FIRE_COUNT.load(Ordering::Relaxed), 0u32);

    // Disparado vence o cancelamento
    list.add_event(TimerEvent::oneshot(1, count_fire, 0, 43));
    list.tick();
    kassert_eq!(FIRE_COUNT.load(Ordering::Relaxed), 1u32);
    kassert!(!list.cancel(43));

    TestResult::Pass
}
